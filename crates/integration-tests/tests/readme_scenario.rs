//! Readme check through the orchestrator: "Tested up to" against the latest release
//! and the parser-warning ignore list.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use plugin_check_checks::util::VersionInfo;
use plugin_check_checks::{default_registry, ChecksConfig};
use plugin_check_core::application::{CheckOrchestrator, CheckSelection, OrchestratorConfig};
use plugin_check_core::domain::CheckResult;
use plugin_check_core::port::id_provider::SequentialIdProvider;
use plugin_check_infra_system::discover_plugin;

const MAIN_FILE: &str = "<?php
/**
 * Plugin Name: Test Plugin Readme Errors Tested Up To
 * Version: 1.0.0
 * License: GPLv2 or later
 */
";

fn plugin(readme: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("test-plugin-readme");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("load.php"), MAIN_FILE).unwrap();
    fs::write(root.join("readme.txt"), readme).unwrap();
    (tmp, root)
}

fn readme(tested: &str, contributors: &str) -> String {
    format!(
        "=== Test Plugin Readme Errors Tested Up To ===
Contributors: {}
Tested up to: {}
Stable tag: 1.0.0
License: GPLv2 or later

Tests the tested up to header.
",
        contributors, tested
    )
}

async fn run_readme_check(root: &Path, config: ChecksConfig) -> CheckResult {
    let registry = default_registry(&config).unwrap();
    let checks = registry
        .select(&CheckSelection {
            include: vec!["plugin_readme".to_string()],
            ..Default::default()
        })
        .unwrap();
    let orchestrator = CheckOrchestrator::new(
        OrchestratorConfig::default(),
        None,
        Arc::new(SequentialIdProvider::default()),
    );
    let context = discover_plugin(root).unwrap();
    orchestrator.run(Arc::new(context), checks).await.unwrap()
}

fn latest(version: &str) -> ChecksConfig {
    ChecksConfig {
        version_info: VersionInfo::with_current(version),
        ..Default::default()
    }
}

/// Tested 6.1 while 5.9 is the latest release: that WordPress does not exist yet
#[tokio::test]
async fn test_tested_up_to_beyond_next_release() {
    let (_tmp, root) = plugin(&readme("6.1", "plugin-team"));
    let result = run_readme_check(&root, latest("5.9")).await;

    let errors = result.get_errors();
    let findings = &errors["readme.txt"][&0][&0];
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].code, "nonexistent_tested_upto_header");
    assert!(findings[0].message.contains("Tested up to: 6.1"));
    assert!(findings[0]
        .message
        .contains("This version of WordPress does not exist (yet)."));
}

/// 6.1 is the next release after 6.0 and the current one for 6.1
#[tokio::test]
async fn test_tested_up_to_current_or_next_release() {
    let (_tmp, root) = plugin(&readme("6.1", "plugin-team"));

    for version in ["6.0", "6.1"] {
        let result = run_readme_check(&root, latest(version)).await;
        assert_eq!(result.get_error_count(), 0, "latest {}", version);
    }
}

/// Readme warnings: the default list hides contributor_ignored, an empty list hides nothing.
/// The invalid contributor is reported by the check itself either way.
#[tokio::test]
async fn test_parser_warning_ignore_list() {
    let (_tmp, root) = plugin(&readme("latest", "Not A Username"));

    let result = run_readme_check(&root, latest("6.1")).await;
    let warnings = result.get_warnings();
    let codes: Vec<&str> = warnings["readme.txt"][&0][&0]
        .iter()
        .map(|f| f.code.as_str())
        .collect();
    assert_eq!(
        codes,
        vec![
            "readme_invalid_contributors",
            "readme_parser_warnings_tested_header_ignored"
        ]
    );
    assert!(warnings["readme.txt"][&0][&0][1]
        .message
        .contains("such as \"6.1\""));

    let show_all = ChecksConfig {
        ignored_readme_warnings: Some(vec![]),
        ..latest("6.1")
    };
    let result = run_readme_check(&root, show_all).await;
    assert_eq!(result.get_warning_count(), 3);
    assert_eq!(result.get_error_count(), 0);
}
