// Storage Namespace Port - switch the host storage layer to an isolated prefix

use async_trait::async_trait;

use crate::port::host::HostError;

#[async_trait]
pub trait StorageNamespace: Send + Sync {
    /// Prefix the host storage currently points at
    async fn current_prefix(&self) -> Result<String, HostError>;

    /// Create an empty, isolated namespace
    async fn create_namespace(&self, prefix: &str) -> Result<(), HostError>;

    /// Point the storage layer at `prefix`
    async fn switch_to(&self, prefix: &str) -> Result<(), HostError>;

    /// Remove a namespace and everything stored in it
    async fn drop_namespace(&self, prefix: &str) -> Result<(), HostError>;
}

/// Namespace prefixes end up in table names, so only `[A-Za-z0-9_]` is allowed
pub fn validate_prefix(prefix: &str) -> Result<(), HostError> {
    if prefix.is_empty() {
        return Err(HostError::Namespace("prefix cannot be empty".to_string()));
    }
    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(HostError::Namespace(format!(
            "prefix must be alphanumeric or underscore: {}",
            prefix
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_prefix() {
        assert!(validate_prefix("wp_").is_ok());
        assert!(validate_prefix("wppc_run1_").is_ok());
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("wp_; DROP TABLE x").is_err());
    }
}
