// Central Error Type for the Application

use thiserror::Error;

use crate::application::preparation::{CleanupError, SetupError};

/// Run-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Host error: {0}")]
    Host(#[from] crate::port::HostError),

    #[error("Setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("Cleanup failed: {0}")]
    Cleanup(#[from] CleanupError),

    #[error("Run timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
