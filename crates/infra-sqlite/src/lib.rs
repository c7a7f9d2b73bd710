// Plugin Check Infrastructure - SQLite Adapter
// Implements: HostConnector, OptionStore, StorageNamespace

mod connection;
mod host;
mod migration;

pub use connection::create_pool;
pub use host::{SqliteHost, SqliteSession};
pub use migration::run_migrations;

use plugin_check_core::port::HostError;

// sqlx::Error -> HostError is a helper function: orphan rules forbid a From impl here
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> HostError {
    HostError::Options(e.to_string())
}
