// Plugin Check Infrastructure - System Adapters
// Implements: PluginLoader (subprocess runner), plugin discovery

pub mod discovery;
pub mod subprocess_loader;

pub use discovery::{discover_plugin, DiscoveryError};
pub use subprocess_loader::{SubprocessPluginLoader, DEFAULT_ENV_ALLOWLIST};
