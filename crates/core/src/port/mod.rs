// Port Layer - Interfaces for the host environment and providers

pub mod host;
pub mod id_provider; // For deterministic testing
pub mod options;
pub mod plugin_loader;
pub mod storage;
pub mod time_provider;

// Re-exports
pub use host::{HostConnector, HostError, HostSession};
pub use id_provider::IdProvider;
pub use options::{OptionStore, OverrideId, OverrideLayer};
pub use plugin_loader::{
    DiagnosticLevel, FunctionCall, HostDiagnostic, LoadReport, LoadRequest, PluginLoader,
};
pub use storage::StorageNamespace;
pub use time_provider::TimeProvider;
