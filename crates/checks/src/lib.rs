// Plugin Check - Concrete Checks
// Static checks read sources only; runtime checks observe the plugin loading in the host

pub mod error;
pub mod general;
pub mod performance;
pub mod plugin_repo;
pub mod registry;
pub mod security;
pub mod util;

pub use error::ChecksError;
pub use registry::{default_registry, ChecksConfig};
