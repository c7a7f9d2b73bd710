// Checks Error Types

use plugin_check_core::domain::DomainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChecksError {
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] DomainError),
}
