// Runtime Environment - live host view handed to runtime checks

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::domain::CheckContext;
use crate::port::{HostError, HostSession, LoadReport, LoadRequest, OptionStore};

/// The bootstrapped, isolated host a run's runtime checks share
pub struct RuntimeEnvironment {
    session: HostSession,
    prefix: String,
    load_report: OnceCell<LoadReport>,
}

impl RuntimeEnvironment {
    pub fn new(session: HostSession, prefix: impl Into<String>) -> Self {
        Self {
            session,
            prefix: prefix.into(),
            load_report: OnceCell::new(),
        }
    }

    /// Storage namespace prefix of this run
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn options(&self) -> &Arc<dyn OptionStore> {
        &self.session.options
    }

    /// Load the target plugin under the active overrides
    ///
    /// The plugin is loaded once per environment; later calls return the same
    /// report. A failed load is not cached.
    pub async fn load_plugin(&self, context: &CheckContext) -> Result<&LoadReport, HostError> {
        self.load_report
            .get_or_try_init(|| async {
                let request = LoadRequest {
                    plugin_file: context.main_file().to_path_buf(),
                    plugin_basename: context.basename().to_string(),
                    table_prefix: self.prefix.clone(),
                    overrides: self.session.options.active_overrides(),
                };
                let report = self.session.loader.load(&request).await?;
                info!(
                    plugin = %request.plugin_basename,
                    calls = report.calls.len(),
                    diagnostics = report.diagnostics.len(),
                    duration_ms = report.duration_ms,
                    "Plugin loaded"
                );
                Ok(report)
            })
            .await
    }
}
