// Option Store Port - host key-value configuration read path
// Overrides live only in memory: a crashed run leaves nothing persisted

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::port::host::HostError;

/// Handle for one registered override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverrideId(u64);

/// Host configuration read path with in-memory overrides
#[async_trait]
pub trait OptionStore: Send + Sync {
    /// Read an option as the host would see it (overrides applied)
    async fn get_option(&self, key: &str) -> Result<Option<Value>, HostError>;

    /// Register an override on the read path; the latest override for a key wins
    fn add_override(&self, key: &str, value: Value) -> OverrideId;

    /// Remove a previously registered override
    ///
    /// Returns false if the handle was unknown (already removed).
    fn remove_override(&self, id: OverrideId) -> bool;

    /// Effective override values, used to hand the state to the plugin loader
    fn active_overrides(&self) -> BTreeMap<String, Value>;
}

/// Reusable override registry for option store adapters
#[derive(Debug, Default)]
pub struct OverrideLayer {
    next_id: AtomicU64,
    entries: Mutex<Vec<(OverrideId, String, Value)>>,
}

impl OverrideLayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(OverrideId, String, Value)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, key: &str, value: Value) -> OverrideId {
        let id = OverrideId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.entries().push((id, key.to_string(), value));
        id
    }

    pub fn remove(&self, id: OverrideId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(entry_id, _, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries()
            .iter()
            .rev()
            .find(|(_, k, _)| k == key)
            .map(|(_, _, v)| v.clone())
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        // Later entries overwrite earlier ones for the same key
        self.entries()
            .iter()
            .map(|(_, k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
