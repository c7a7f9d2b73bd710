// Host Environment Port
// One session per orchestrator run: namespaces and overrides are never shared between runs

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::port::options::OptionStore;
use crate::port::plugin_loader::PluginLoader;
use crate::port::storage::StorageNamespace;

/// Errors raised by host adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Storage namespace error: {0}")]
    Namespace(String),

    #[error("Option store error: {0}")]
    Options(String),

    #[error("Plugin load failed: {0}")]
    Load(String),

    #[error("Host spawn failed: {0}")]
    Spawn(String),

    #[error("Host timed out after {0}ms")]
    Timeout(u64),

    #[error("Host connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Host collaborators bound to a single run
#[derive(Clone)]
pub struct HostSession {
    pub options: Arc<dyn OptionStore>,
    pub storage: Arc<dyn StorageNamespace>,
    pub loader: Arc<dyn PluginLoader>,
}

/// Opens a fresh host session
///
/// Implementations:
/// - SqliteHost: options tables in SQLite (infra-sqlite)
/// - InMemoryHost: in-process maps for tests
#[async_trait]
pub trait HostConnector: Send + Sync {
    async fn connect(&self) -> Result<HostSession, HostError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::options::{OverrideId, OverrideLayer};
    use crate::port::plugin_loader::mocks::ScriptedLoader;
    use crate::port::storage::validate_prefix;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    pub const BASE_PREFIX: &str = "wp_";

    #[derive(Debug, Default)]
    struct HostState {
        namespaces: BTreeMap<String, BTreeMap<String, Value>>,
        created: Vec<String>,
        dropped: Vec<String>,
        fail_create: bool,
        fail_drop: bool,
    }

    /// In-memory host with persisted options per namespace and call tracking
    pub struct InMemoryHost {
        state: Arc<Mutex<HostState>>,
        loader: Arc<ScriptedLoader>,
        sessions: Mutex<Vec<Arc<InMemorySession>>>,
    }

    impl InMemoryHost {
        /// Host with a few active plugins and a non-default theme in `wp_`
        pub fn new(loader: Arc<ScriptedLoader>) -> Self {
            let mut base = BTreeMap::new();
            base.insert(
                "active_plugins".to_string(),
                json!(["akismet/akismet.php", "hello.php"]),
            );
            base.insert("template".to_string(), json!("twentytwenty"));
            base.insert("stylesheet".to_string(), json!("twentytwenty-child"));
            base.insert("current_theme".to_string(), json!("Twenty Twenty Child"));

            let mut state = HostState::default();
            state.namespaces.insert(BASE_PREFIX.to_string(), base);

            Self {
                state: Arc::new(Mutex::new(state)),
                loader,
                sessions: Mutex::new(Vec::new()),
            }
        }

        pub fn fail_namespace_creation(&self) {
            self.state.lock().unwrap().fail_create = true;
        }

        pub fn fail_namespace_drop(&self) {
            self.state.lock().unwrap().fail_drop = true;
        }

        pub fn created_namespaces(&self) -> Vec<String> {
            self.state.lock().unwrap().created.clone()
        }

        pub fn dropped_namespaces(&self) -> Vec<String> {
            self.state.lock().unwrap().dropped.clone()
        }

        pub fn namespace_exists(&self, prefix: &str) -> bool {
            self.state.lock().unwrap().namespaces.contains_key(prefix)
        }

        pub fn persisted_option(&self, prefix: &str, key: &str) -> Option<Value> {
            self.state
                .lock()
                .unwrap()
                .namespaces
                .get(prefix)
                .and_then(|ns| ns.get(key).cloned())
        }

        pub fn sessions(&self) -> Vec<Arc<InMemorySession>> {
            self.sessions.lock().unwrap().clone()
        }

        pub fn loader(&self) -> Arc<ScriptedLoader> {
            Arc::clone(&self.loader)
        }
    }

    #[async_trait]
    impl HostConnector for InMemoryHost {
        async fn connect(&self) -> Result<HostSession, HostError> {
            let session = Arc::new(InMemorySession {
                state: Arc::clone(&self.state),
                current: Mutex::new(BASE_PREFIX.to_string()),
                overrides: OverrideLayer::new(),
            });
            self.sessions.lock().unwrap().push(Arc::clone(&session));

            let loader: Arc<dyn PluginLoader> = self.loader.clone();
            Ok(HostSession {
                options: session.clone(),
                storage: session,
                loader,
            })
        }
    }

    /// Session view over the shared in-memory host
    pub struct InMemorySession {
        state: Arc<Mutex<HostState>>,
        current: Mutex<String>,
        overrides: OverrideLayer,
    }

    impl InMemorySession {
        pub fn override_count(&self) -> usize {
            self.overrides.len()
        }

        pub fn current(&self) -> String {
            self.current.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OptionStore for InMemorySession {
        async fn get_option(&self, key: &str) -> Result<Option<Value>, HostError> {
            if let Some(value) = self.overrides.get(key) {
                return Ok(Some(value));
            }
            let prefix = self.current();
            let state = self.state.lock().unwrap();
            let namespace = state
                .namespaces
                .get(&prefix)
                .ok_or_else(|| HostError::Options(format!("no namespace {}", prefix)))?;
            Ok(namespace.get(key).cloned())
        }

        fn add_override(&self, key: &str, value: Value) -> OverrideId {
            self.overrides.add(key, value)
        }

        fn remove_override(&self, id: OverrideId) -> bool {
            self.overrides.remove(id)
        }

        fn active_overrides(&self) -> BTreeMap<String, Value> {
            self.overrides.snapshot()
        }
    }

    #[async_trait]
    impl StorageNamespace for InMemorySession {
        async fn current_prefix(&self) -> Result<String, HostError> {
            Ok(self.current())
        }

        async fn create_namespace(&self, prefix: &str) -> Result<(), HostError> {
            validate_prefix(prefix)?;
            let mut state = self.state.lock().unwrap();
            if state.fail_create {
                return Err(HostError::Namespace(format!(
                    "cannot create namespace {}",
                    prefix
                )));
            }
            if state.namespaces.contains_key(prefix) {
                return Err(HostError::Namespace(format!(
                    "namespace {} already exists",
                    prefix
                )));
            }
            state.namespaces.insert(prefix.to_string(), BTreeMap::new());
            state.created.push(prefix.to_string());
            Ok(())
        }

        async fn switch_to(&self, prefix: &str) -> Result<(), HostError> {
            if !self.state.lock().unwrap().namespaces.contains_key(prefix) {
                return Err(HostError::Namespace(format!("unknown namespace {}", prefix)));
            }
            *self.current.lock().unwrap() = prefix.to_string();
            Ok(())
        }

        async fn drop_namespace(&self, prefix: &str) -> Result<(), HostError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_drop {
                return Err(HostError::Namespace(format!("cannot drop namespace {}", prefix)));
            }
            state.namespaces.remove(prefix);
            state.dropped.push(prefix.to_string());
            Ok(())
        }
    }
}
