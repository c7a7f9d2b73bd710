// CLI configuration: flags, environment fallbacks and defaults

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use plugin_check_checks::util::VersionInfo;
use plugin_check_checks::ChecksConfig;
use plugin_check_checks::registry::DEFAULT_WP_VERSION;
use plugin_check_checks::security::DEFAULT_DISALLOWED_FUNCTIONS;
use plugin_check_core::application::OrchestratorConfig;

pub const DEFAULT_HOST_DB: &str = "~/.plugin-check/host.db";
pub const DEFAULT_BASE_PREFIX: &str = "wp_";
pub const DEFAULT_LOG_FILTER: &str = "plugin_check=info";

/// Where the latest WordPress version comes from
#[derive(Debug, Clone, Default)]
pub struct VersionSource {
    /// Saved version-check API response
    pub version_check_file: Option<PathBuf>,
    pub wp_version: Option<String>,
    /// PHP version quoted in readme advice
    pub recommended_php: Option<String>,
}

impl VersionSource {
    /// File beats explicit version beats the built-in default
    pub fn resolve(&self) -> Result<VersionInfo> {
        if let Some(path) = &self.version_check_file {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read version-check file {}", path.display()))?;
            let info = VersionInfo::from_version_check(&body)
                .with_context(|| format!("Invalid version-check response in {}", path.display()))?;
            if info.latest_version().is_some() {
                return Ok(info.with_recommended_php(self.recommended_php.clone()));
            }
            tracing::warn!(path = %path.display(), "Version-check response has no offer");
        }

        Ok(VersionInfo::with_current(
            self.wp_version.as_deref().unwrap_or(DEFAULT_WP_VERSION),
        )
        .with_recommended_php(self.recommended_php.clone()))
    }
}

pub fn checks_config(
    version: &VersionSource,
    ignored_readme_warnings: &[String],
    show_all_readme_warnings: bool,
) -> Result<ChecksConfig> {
    // No flag keeps the default ignore list
    let ignored_readme_warnings = if show_all_readme_warnings {
        Some(Vec::new())
    } else if ignored_readme_warnings.is_empty() {
        None
    } else {
        Some(ignored_readme_warnings.to_vec())
    };

    Ok(ChecksConfig {
        version_info: version.resolve()?,
        ignored_readme_warnings,
        disallowed_functions: DEFAULT_DISALLOWED_FUNCTIONS
            .iter()
            .map(|f| f.to_string())
            .collect(),
    })
}

pub fn orchestrator_config(max_parallel: usize, timeout_secs: Option<u64>) -> OrchestratorConfig {
    OrchestratorConfig {
        max_parallel_static: max_parallel.max(1),
        run_timeout: timeout_secs.map(Duration::from_secs),
        ..Default::default()
    }
}

/// Expand `~` and build a sqlx SQLite URL, creating the parent directory
pub fn host_database_url(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path).into_owned();
    if let Some(parent) = Path::new(&expanded).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(format!("sqlite://{}", expanded))
}
