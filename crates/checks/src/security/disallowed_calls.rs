// Disallowed Runtime Calls Check
// Functions that change the host's runtime configuration must not run at plugin load

use async_trait::async_trait;
use std::collections::BTreeSet;

use plugin_check_core::application::{CheckError, RuntimeCheck, RuntimeEnvironment};
use plugin_check_core::domain::{CheckContext, CheckResult, Finding};

use crate::util::{is_plugin_file, plugin_location};

pub const DEFAULT_DISALLOWED_FUNCTIONS: &[&str] = &[
    "error_reporting",
    "ini_set",
    "set_time_limit",
    "ini_alter",
    "dl",
    "create_function",
];

pub struct DisallowedRuntimeCallsCheck {
    functions: BTreeSet<String>,
}

impl DisallowedRuntimeCallsCheck {
    /// Function names are matched case-insensitively
    pub fn new<I, S>(functions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            functions: functions
                .into_iter()
                .map(|f| f.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Default for DisallowedRuntimeCallsCheck {
    fn default() -> Self {
        Self::new(DEFAULT_DISALLOWED_FUNCTIONS)
    }
}

#[async_trait]
impl RuntimeCheck for DisallowedRuntimeCallsCheck {
    async fn run(
        &self,
        context: &CheckContext,
        environment: &RuntimeEnvironment,
        result: &CheckResult,
    ) -> Result<(), CheckError> {
        let report = environment.load_plugin(context).await?;

        // Calls made by the host itself are not the plugin's doing
        for call in report
            .calls
            .iter()
            .filter(|c| is_plugin_file(context, c.file.as_deref()))
            .filter(|c| self.functions.contains(&c.function.to_ascii_lowercase()))
        {
            let (file, line) = plugin_location(context, call.file.as_deref(), call.line);
            result.add_finding(
                Finding::error(
                    "disallowed_function_call",
                    format!(
                        "{}() was called while the plugin loaded. Plugins must not change the server configuration.",
                        call.function
                    ),
                )
                .in_file(file)
                .at(line, 0),
            );
        }
        Ok(())
    }
}
