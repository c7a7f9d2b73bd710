// Plugin Loader Port
// Abstraction for executing a plugin's top-level code inside the host

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::port::host::HostError;

/// Everything the host needs to load a plugin under the current overrides
#[derive(Debug, Clone, Serialize)]
pub struct LoadRequest {
    pub plugin_file: PathBuf,
    pub plugin_basename: String,
    pub table_prefix: String,
    pub overrides: BTreeMap<String, Value>,
}

/// A function that executed while the plugin loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub function: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub line: u32,
}

/// Level of a diagnostic reported by the host itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Notice,
    Deprecated,
    Warning,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDiagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub line: u32,
}

/// Observed behavior of one plugin load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub calls: Vec<FunctionCall>,
    pub diagnostics: Vec<HostDiagnostic>,
    pub duration_ms: i64,
}

impl LoadReport {
    pub fn has_fatal(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == DiagnosticLevel::Fatal)
    }
}

/// Plugin Loader trait
///
/// Implementations:
/// - SubprocessPluginLoader: runs a host runner process (infra-system)
/// - ScriptedLoader: canned reports for tests
#[async_trait]
pub trait PluginLoader: Send + Sync {
    /// Execute the plugin's registration code and report what happened
    ///
    /// # Errors
    /// - HostError::Spawn if the host cannot be started
    /// - HostError::Timeout if loading exceeds the loader deadline
    async fn load(&self, request: &LoadRequest) -> Result<LoadReport, HostError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted loader behavior
    #[derive(Debug, Clone)]
    pub enum LoadBehavior {
        /// Return this report
        Report(LoadReport),
        /// Fail with a host error
        Fail(String),
        /// Never finish within any sane timeout
        Hang(Duration),
    }

    /// Loader returning canned reports, recording every request
    pub struct ScriptedLoader {
        behavior: Mutex<LoadBehavior>,
        requests: Arc<Mutex<Vec<LoadRequest>>>,
    }

    impl ScriptedLoader {
        pub fn new(behavior: LoadBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn with_report(report: LoadReport) -> Self {
            Self::new(LoadBehavior::Report(report))
        }

        pub fn empty() -> Self {
            Self::with_report(LoadReport::default())
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self::new(LoadBehavior::Fail(message.into()))
        }

        pub fn hanging() -> Self {
            Self::new(LoadBehavior::Hang(Duration::from_secs(3600)))
        }

        pub fn load_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests(&self) -> Vec<LoadRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PluginLoader for ScriptedLoader {
        async fn load(&self, request: &LoadRequest) -> Result<LoadReport, HostError> {
            self.requests.lock().unwrap().push(request.clone());
            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                LoadBehavior::Report(report) => Ok(report),
                LoadBehavior::Fail(msg) => Err(HostError::Load(msg)),
                LoadBehavior::Hang(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(LoadReport::default())
                }
            }
        }
    }
}
