// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid severity: {0} (expected ERROR or WARNING)")]
    InvalidSeverity(String),

    #[error("Invalid check context: {0}")]
    InvalidContext(String),

    #[error("Check already registered: {0}")]
    DuplicateCheck(String),

    #[error("Unknown check(s): {}", .0.join(", "))]
    UnknownCheck(Vec<String>),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
