// Domain Layer - Pure types for one inspection run

pub mod context;
pub mod error;
pub mod finding;
pub mod ignore;
pub mod plugin_header;
pub mod result;

// Re-exports
pub use context::CheckContext;
pub use error::DomainError;
pub use finding::{Finding, Severity};
pub use ignore::IgnoreList;
pub use plugin_header::PluginHeaders;
pub use result::{CheckFailure, CheckResult, FindingMap, ResultReport};
