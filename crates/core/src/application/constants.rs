// Orchestrator constants (No magic values)
use std::time::Duration;

/// Upper bound on static checks running at the same time
pub const DEFAULT_MAX_PARALLEL_STATIC: usize = 4;

/// Prefix of every temporary storage namespace, followed by a run id
pub const DEFAULT_NAMESPACE_BASE: &str = "wppc_";

/// Neutral theme activated inside the isolated environment
pub const DEFAULT_THEME: &str = "twentytwentyfour";

/// Theme root reported while the default theme is forced
pub const DEFAULT_THEME_ROOT: &str = "/themes";

/// Host configuration keys snapshotted before bootstrap and verified after teardown
pub const SNAPSHOT_KEYS: &[&str] = &[
    "active_plugins",
    "template",
    "stylesheet",
    "current_theme",
    "template_root",
    "stylesheet_root",
];

/// Name of the mandatory first preparation
pub const BOOTSTRAP_PREPARATION: &str = "environment_bootstrap";

/// Deadline for one plugin load in the host runner (30s)
pub const DEFAULT_LOADER_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period between SIGTERM and SIGKILL for a stuck runner (5s)
pub const GRACEFUL_SHUTDOWN_TIMEOUT_MS: u64 = 5000;
