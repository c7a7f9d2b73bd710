// Environment Bootstrap
// Isolated storage namespace + configuration overrides, verified on teardown

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::constants::{BOOTSTRAP_PREPARATION, DEFAULT_THEME_ROOT, SNAPSHOT_KEYS};
use crate::application::preparation::{Cleanup, Preparation};
use crate::port::{HostError, HostSession, OptionStore, OverrideId, StorageNamespace};

/// Host configuration captured before any mutation
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentSnapshot {
    values: BTreeMap<String, Option<Value>>,
}

impl EnvironmentSnapshot {
    pub async fn capture(options: &dyn OptionStore, keys: &[&str]) -> Result<Self, HostError> {
        let mut values = BTreeMap::new();
        for key in keys {
            values.insert(key.to_string(), options.get_option(key).await?);
        }
        Ok(Self { values })
    }

    /// Keys whose current value differs from the captured one
    pub async fn diverging_keys(&self, options: &dyn OptionStore) -> Result<Vec<String>, HostError> {
        let mut diverging = Vec::new();
        for (key, expected) in &self.values {
            if options.get_option(key).await? != *expected {
                diverging.push(key.clone());
            }
        }
        Ok(diverging)
    }
}

/// Mandatory first preparation of every run with runtime checks
pub struct EnvironmentBootstrap {
    session: HostSession,
    plugin_basename: String,
    prefix: String,
    theme: String,
}

impl EnvironmentBootstrap {
    pub fn new(
        session: HostSession,
        plugin_basename: impl Into<String>,
        prefix: impl Into<String>,
        theme: impl Into<String>,
    ) -> Self {
        Self {
            session,
            plugin_basename: plugin_basename.into(),
            prefix: prefix.into(),
            theme: theme.into(),
        }
    }

    fn register_overrides(&self) -> Vec<OverrideId> {
        let options = &self.session.options;
        let theme = json!(self.theme);
        vec![
            options.add_override("active_plugins", json!([self.plugin_basename])),
            options.add_override("template", theme.clone()),
            options.add_override("stylesheet", theme.clone()),
            options.add_override("current_theme", theme),
            options.add_override("template_root", json!(DEFAULT_THEME_ROOT)),
            options.add_override("stylesheet_root", json!(DEFAULT_THEME_ROOT)),
        ]
    }
}

#[async_trait]
impl Preparation for EnvironmentBootstrap {
    fn name(&self) -> &str {
        BOOTSTRAP_PREPARATION
    }

    async fn prepare(&self) -> Result<Cleanup, HostError> {
        let options = Arc::clone(&self.session.options);
        let storage = Arc::clone(&self.session.storage);

        let snapshot = EnvironmentSnapshot::capture(options.as_ref(), SNAPSHOT_KEYS).await?;
        let original = storage.current_prefix().await?;

        storage.create_namespace(&self.prefix).await?;
        if let Err(e) = storage.switch_to(&self.prefix).await {
            if let Err(drop_err) = storage.drop_namespace(&self.prefix).await {
                warn!(prefix = %self.prefix, error = %drop_err, "Failed to drop namespace after switch failure");
            }
            return Err(e);
        }

        let overrides = self.register_overrides();
        info!(
            prefix = %self.prefix,
            original = %original,
            plugin = %self.plugin_basename,
            theme = %self.theme,
            "Environment bootstrapped"
        );

        let prefix = self.prefix.clone();
        Ok(Cleanup::new(BOOTSTRAP_PREPARATION, move || {
            teardown(options, storage, overrides, original, prefix, snapshot)
        }))
    }
}

async fn teardown(
    options: Arc<dyn OptionStore>,
    storage: Arc<dyn StorageNamespace>,
    overrides: Vec<OverrideId>,
    original: String,
    prefix: String,
    snapshot: EnvironmentSnapshot,
) -> Result<(), String> {
    let mut problems = Vec::new();

    for id in overrides {
        options.remove_override(id);
    }

    // Never drop the namespace we are still switched to
    match storage.switch_to(&original).await {
        Ok(()) => {
            if let Err(e) = storage.drop_namespace(&prefix).await {
                problems.push(format!("namespace {} left behind: {}", prefix, e));
            }
        }
        Err(e) => problems.push(format!(
            "could not switch back to {}, namespace {} left active: {}",
            original, prefix, e
        )),
    }

    match snapshot.diverging_keys(options.as_ref()).await {
        Ok(keys) if keys.is_empty() => {}
        Ok(keys) => problems.push(format!(
            "configuration not restored for keys: {}",
            keys.join(", ")
        )),
        Err(e) => problems.push(format!("could not verify configuration: {}", e)),
    }

    if problems.is_empty() {
        info!(prefix = %prefix, "Environment torn down");
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}
