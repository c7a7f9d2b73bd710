// Runtime Load Errors Check
// Reports errors, warnings and notices raised while the plugin loads in the host

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use plugin_check_core::application::{
    CheckError, OverridePreparation, Preparation, RuntimeCheck, RuntimeEnvironment,
};
use plugin_check_core::domain::{CheckContext, CheckResult, Finding};
use plugin_check_core::port::{DiagnosticLevel, HostSession};

use crate::util::plugin_location;

/// Preparation raising the host's error reporting to everything
pub const DEBUG_REPORTING_PREPARATION: &str = "debug_reporting";

/// Option consulted by the host runner for its error reporting level
pub const ERROR_REPORTING_OPTION: &str = "plugin_check_error_reporting";

pub struct RuntimeLoadErrorsCheck;

#[async_trait]
impl RuntimeCheck for RuntimeLoadErrorsCheck {
    fn preparations(
        &self,
        _context: &CheckContext,
        session: &HostSession,
    ) -> Vec<Arc<dyn Preparation>> {
        vec![Arc::new(OverridePreparation::new(
            DEBUG_REPORTING_PREPARATION,
            Arc::clone(&session.options),
            vec![(ERROR_REPORTING_OPTION.to_string(), json!("E_ALL"))],
        ))]
    }

    async fn run(
        &self,
        context: &CheckContext,
        environment: &RuntimeEnvironment,
        result: &CheckResult,
    ) -> Result<(), CheckError> {
        let report = environment.load_plugin(context).await?;

        for diagnostic in &report.diagnostics {
            let (file, line) = plugin_location(context, diagnostic.file.as_deref(), diagnostic.line);
            let finding = match diagnostic.level {
                DiagnosticLevel::Fatal => Finding::error("runtime_fatal_error", &diagnostic.message),
                DiagnosticLevel::Warning => Finding::warning("runtime_warning", &diagnostic.message),
                DiagnosticLevel::Notice => Finding::warning("runtime_notice", &diagnostic.message),
                DiagnosticLevel::Deprecated => {
                    Finding::warning("runtime_deprecated", &diagnostic.message)
                }
            };
            result.add_finding(finding.in_file(file).at(line, 0));
        }
        Ok(())
    }
}
