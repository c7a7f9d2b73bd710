//! End-to-end runs: discovery, the default registry, the orchestrator and the host adapters.

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use plugin_check_checks::util::VersionInfo;
use plugin_check_checks::{default_registry, ChecksConfig};
use plugin_check_core::application::{CheckOrchestrator, CheckSelection, OrchestratorConfig};
use plugin_check_core::domain::{CheckResult, Severity};
use plugin_check_core::port::host::mocks::InMemoryHost;
use plugin_check_core::port::id_provider::SequentialIdProvider;
use plugin_check_core::port::plugin_loader::mocks::ScriptedLoader;
use plugin_check_core::port::{
    DiagnosticLevel, FunctionCall, HostConnector, HostDiagnostic, LoadReport,
};
use plugin_check_core::AppError;
use plugin_check_infra_sqlite::{create_pool, run_migrations, SqliteHost};
use plugin_check_infra_system::discover_plugin;

const MAIN_FILE: &str = "<?php
/**
 * Plugin Name: Demo
 * Version: 1.2.0
 * License: GPLv2 or later
 */
require __DIR__ . '/templates/banner.php';
";

const README: &str = "=== Demo ===
Contributors: plugin-team
Tags: demo
Tested up to: 6.7
Stable tag: 1.2.0
License: GPLv2 or later

A demo plugin.
";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// `demo/` with a clean readme and one template using a raw <img>
fn fixture_plugin(tmp: &TempDir) -> PathBuf {
    let root = tmp.path().join("demo");
    write(&root.join("demo.php"), MAIN_FILE);
    write(&root.join("readme.txt"), README);
    write(
        &root.join("templates/banner.php"),
        "<div>\n<img src=\"banner.png\">\n</div>\n",
    );
    write(&root.join("vendor/lib/skip.php"), "<img src=\"vendor.png\">\n");
    root.canonicalize().unwrap()
}

fn load_report(root: &Path) -> LoadReport {
    LoadReport {
        calls: vec![
            FunctionCall {
                function: "ini_set".to_string(),
                file: Some(root.join("demo.php")),
                line: 9,
            },
            FunctionCall {
                function: "set_time_limit".to_string(),
                file: Some(PathBuf::from("/srv/wp/wp-settings.php")),
                line: 120,
            },
        ],
        diagnostics: vec![HostDiagnostic {
            level: DiagnosticLevel::Warning,
            message: "Undefined variable $banner".to_string(),
            file: Some(root.join("templates/banner.php")),
            line: 2,
        }],
        duration_ms: 12,
    }
}

fn checks_config() -> ChecksConfig {
    ChecksConfig {
        version_info: VersionInfo::with_current("6.7.1"),
        ..Default::default()
    }
}

fn codes(result: &CheckResult, severity: Severity) -> Vec<String> {
    result
        .findings()
        .into_iter()
        .filter(|f| f.severity == severity)
        .map(|f| f.code)
        .collect()
}

/// Every bundled check against the in-memory host: findings from both phases, host restored
#[tokio::test]
async fn test_full_run_against_in_memory_host() {
    let tmp = TempDir::new().unwrap();
    let root = fixture_plugin(&tmp);
    let context = discover_plugin(&root).unwrap();

    let loader = Arc::new(ScriptedLoader::with_report(load_report(&root)));
    let host = Arc::new(InMemoryHost::new(Arc::clone(&loader)));
    let registry = default_registry(&checks_config()).unwrap();
    let checks = registry.select(&CheckSelection::default()).unwrap();

    let orchestrator = CheckOrchestrator::new(
        OrchestratorConfig::default(),
        Some(host.clone() as Arc<dyn HostConnector>),
        Arc::new(SequentialIdProvider::default()),
    );
    let result = orchestrator.run(Arc::new(context), checks).await.unwrap();

    assert!(!result.has_failures(), "{:?}", result.failed_checks());
    assert_eq!(codes(&result, Severity::Error), vec!["disallowed_function_call"]);
    assert_eq!(
        codes(&result, Severity::Warning),
        vec!["runtime_warning", "non_enqueued_image"]
    );
    let warnings = result.get_warnings();
    assert_eq!(warnings["templates/banner.php"][&2][&1][0].code, "non_enqueued_image");
    assert_eq!(warnings["templates/banner.php"][&2][&0][0].code, "runtime_warning");

    // One load, under the bootstrap and debug overrides
    assert_eq!(loader.load_count(), 1);
    let request = &loader.requests()[0];
    assert_eq!(request.table_prefix, "wppc_run1_");
    assert_eq!(request.overrides["active_plugins"], json!(["demo/demo.php"]));
    assert_eq!(request.overrides["plugin_check_error_reporting"], json!("E_ALL"));

    // Host left as it was found
    assert_eq!(host.created_namespaces(), vec!["wppc_run1_"]);
    assert_eq!(host.dropped_namespaces(), vec!["wppc_run1_"]);
    assert!(!host.namespace_exists("wppc_run1_"));
    assert_eq!(
        host.persisted_option("wp_", "active_plugins"),
        Some(json!(["akismet/akismet.php", "hello.php"]))
    );
    let session = &host.sessions()[0];
    assert_eq!(session.override_count(), 0);
    assert_eq!(session.current(), "wp_");
}

/// Same run backed by SQLite: the temporary namespace is gone afterwards
#[tokio::test]
async fn test_full_run_against_sqlite_host() {
    let tmp = TempDir::new().unwrap();
    let root = fixture_plugin(&tmp);
    let context = discover_plugin(&root).unwrap();

    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool, "wp_").await.unwrap();
    let loader = Arc::new(ScriptedLoader::with_report(load_report(&root)));
    let host = Arc::new(SqliteHost::new(pool, "wp_", loader.clone()));
    host.update_option("wp_", "active_plugins", &json!(["akismet/akismet.php"]))
        .await
        .unwrap();
    host.update_option("wp_", "template", &json!("twentytwenty"))
        .await
        .unwrap();

    let registry = default_registry(&checks_config()).unwrap();
    let checks = registry.select(&CheckSelection::default()).unwrap();
    let orchestrator = CheckOrchestrator::new(
        OrchestratorConfig::default(),
        Some(host.clone() as Arc<dyn HostConnector>),
        Arc::new(SequentialIdProvider::default()),
    );
    let result = orchestrator.run(Arc::new(context), checks).await.unwrap();

    assert_eq!(result.get_error_count(), 1);
    assert_eq!(result.get_warning_count(), 2);
    assert!(host.namespaces().await.unwrap().is_empty());
    assert_eq!(
        host.stored_option("wp_", "active_plugins").await.unwrap(),
        Some(json!(["akismet/akismet.php"]))
    );
    assert_eq!(
        host.stored_option("wp_", "template").await.unwrap(),
        Some(json!("twentytwenty"))
    );
}

/// Static-only selection needs no host at all
#[tokio::test]
async fn test_static_only_run_without_host() {
    let tmp = TempDir::new().unwrap();
    let root = fixture_plugin(&tmp);
    let context = discover_plugin(&root).unwrap();

    let registry = default_registry(&checks_config()).unwrap();
    let checks = registry
        .select(&CheckSelection {
            exclude: vec![
                "runtime_load_errors".to_string(),
                "disallowed_runtime_calls".to_string(),
            ],
            ..Default::default()
        })
        .unwrap();
    let orchestrator = CheckOrchestrator::new(
        OrchestratorConfig::default(),
        None,
        Arc::new(SequentialIdProvider::default()),
    );

    let result = orchestrator.run(Arc::new(context), checks).await.unwrap();
    assert_eq!(codes(&result, Severity::Warning), vec!["non_enqueued_image"]);
    assert_eq!(result.get_error_count(), 0);
}

/// Runtime checks without a host are a configuration error
#[tokio::test]
async fn test_runtime_checks_require_host() {
    let tmp = TempDir::new().unwrap();
    let root = fixture_plugin(&tmp);
    let context = discover_plugin(&root).unwrap();

    let registry = default_registry(&checks_config()).unwrap();
    let checks = registry
        .select(&CheckSelection {
            include: vec!["runtime_load_errors".to_string()],
            ..Default::default()
        })
        .unwrap();
    let orchestrator = CheckOrchestrator::new(
        OrchestratorConfig::default(),
        None,
        Arc::new(SequentialIdProvider::default()),
    );

    let err = orchestrator.run(Arc::new(context), checks).await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

/// A crashing loader is recorded as failed runtime checks, static findings survive
#[tokio::test]
async fn test_loader_failure_keeps_static_findings() {
    let tmp = TempDir::new().unwrap();
    let root = fixture_plugin(&tmp);
    let context = discover_plugin(&root).unwrap();

    let host = Arc::new(InMemoryHost::new(Arc::new(ScriptedLoader::failing(
        "runner exited with signal 11",
    ))));
    let registry = default_registry(&checks_config()).unwrap();
    let checks = registry.select(&CheckSelection::default()).unwrap();
    let orchestrator = CheckOrchestrator::new(
        OrchestratorConfig::default(),
        Some(host.clone() as Arc<dyn HostConnector>),
        Arc::new(SequentialIdProvider::default()),
    );

    let result = orchestrator.run(Arc::new(context), checks).await.unwrap();

    let failed: Vec<String> = result.failed_checks().into_iter().map(|f| f.check).collect();
    assert_eq!(failed, vec!["disallowed_runtime_calls", "runtime_load_errors"]);
    assert_eq!(codes(&result, Severity::Warning), vec!["non_enqueued_image"]);
    assert_eq!(host.dropped_namespaces(), vec!["wppc_run1_"]);
}

/// The real subprocess loader feeding the orchestrator
#[cfg(unix)]
#[tokio::test]
async fn test_subprocess_runner_end_to_end() {
    use plugin_check_core::port::time_provider::SystemTimeProvider;
    use plugin_check_infra_system::SubprocessPluginLoader;

    let tmp = TempDir::new().unwrap();
    let root = fixture_plugin(&tmp);
    let context = discover_plugin(&root).unwrap();

    // The runner reports a fatal in the plugin's main file
    let script = r#"printf '{"event":"diagnostic","level":"fatal","message":"Call to undefined function demo_boot()","file":"%s","line":4}\n' "$PLUGIN_CHECK_PLUGIN_FILE"
exit 255"#;
    let loader = Arc::new(SubprocessPluginLoader::new(
        Arc::new(SystemTimeProvider),
        "sh",
        vec!["-c".to_string(), script.to_string(), "runner".to_string()],
    ));
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool, "wp_").await.unwrap();
    let host = Arc::new(SqliteHost::new(pool, "wp_", loader));

    let registry = default_registry(&checks_config()).unwrap();
    let checks = registry
        .select(&CheckSelection {
            include: vec!["runtime_load_errors".to_string()],
            ..Default::default()
        })
        .unwrap();
    let orchestrator = CheckOrchestrator::new(
        OrchestratorConfig::default(),
        Some(host.clone() as Arc<dyn HostConnector>),
        Arc::new(SequentialIdProvider::default()),
    );

    let result = orchestrator.run(Arc::new(context), checks).await.unwrap();

    let errors = result.get_errors();
    assert_eq!(result.get_error_count(), 1);
    assert_eq!(errors["demo.php"][&4][&0][0].code, "runtime_fatal_error");
    assert!(host.namespaces().await.unwrap().is_empty());
}
