// Default check registry

use tracing::debug;

use plugin_check_core::application::{CheckCategory, CheckRegistry};

use crate::error::ChecksError;
use crate::general::RuntimeLoadErrorsCheck;
use crate::performance::ImageFunctionsCheck;
use crate::plugin_repo::PluginReadmeCheck;
use crate::security::{DisallowedRuntimeCallsCheck, DEFAULT_DISALLOWED_FUNCTIONS};
use crate::util::VersionInfo;

/// Latest WordPress release assumed when none is configured
pub const DEFAULT_WP_VERSION: &str = "6.7.1";

/// Inputs of the bundled checks
#[derive(Debug, Clone)]
pub struct ChecksConfig {
    pub version_info: VersionInfo,
    /// `None` keeps the default readme warning ignore list, `Some(vec![])` shows all
    pub ignored_readme_warnings: Option<Vec<String>>,
    pub disallowed_functions: Vec<String>,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            version_info: VersionInfo::with_current(DEFAULT_WP_VERSION),
            ignored_readme_warnings: None,
            disallowed_functions: DEFAULT_DISALLOWED_FUNCTIONS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

/// Registry with every bundled check
///
/// # Errors
/// - ChecksError::Pattern if a check pattern fails to compile
/// - ChecksError::Registry on a duplicate slug
pub fn default_registry(config: &ChecksConfig) -> Result<CheckRegistry, ChecksError> {
    let mut registry = CheckRegistry::new();

    registry.register_static(
        "plugin_readme",
        vec![CheckCategory::PluginRepo],
        PluginReadmeCheck::new(
            config.version_info.clone(),
            config.ignored_readme_warnings.clone(),
        )?,
    )?;
    registry.register_static(
        "image_functions",
        vec![CheckCategory::Performance],
        ImageFunctionsCheck::new()?,
    )?;
    registry.register_runtime(
        "runtime_load_errors",
        vec![CheckCategory::General],
        RuntimeLoadErrorsCheck,
    )?;
    registry.register_runtime(
        "disallowed_runtime_calls",
        vec![CheckCategory::Security],
        DisallowedRuntimeCallsCheck::new(&config.disallowed_functions),
    )?;

    debug!(checks = registry.len(), "Check registry built");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugin_check_core::application::CheckSelection;
    use plugin_check_core::domain::DomainError;

    #[test]
    fn test_default_registry_contents() {
        let registry = default_registry(&ChecksConfig::default()).unwrap();
        let slugs: Vec<String> = registry.all().iter().map(|c| c.slug().to_string()).collect();
        assert_eq!(
            slugs,
            vec![
                "disallowed_runtime_calls",
                "image_functions",
                "plugin_readme",
                "runtime_load_errors"
            ]
        );
        assert!(registry.get("runtime_load_errors").unwrap().is_runtime());
        assert!(!registry.get("plugin_readme").unwrap().is_runtime());
    }

    #[test]
    fn test_category_selection() {
        let registry = default_registry(&ChecksConfig::default()).unwrap();
        let selected = registry
            .select(&CheckSelection {
                categories: vec![CheckCategory::PluginRepo, CheckCategory::Performance],
                ..Default::default()
            })
            .unwrap();
        assert!(selected.iter().all(|c| !c.is_runtime()));
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_unknown_slug_rejected() {
        let registry = default_registry(&ChecksConfig::default()).unwrap();
        let err = registry
            .select(&CheckSelection {
                include: vec!["plugin_readme".into(), "i18n_usage".into()],
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, DomainError::UnknownCheck(vec!["i18n_usage".to_string()]));
    }
}
