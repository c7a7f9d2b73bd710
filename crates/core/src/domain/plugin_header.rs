// Plugin Header - `Key: value` block at the top of the plugin main file

use serde::Serialize;
use std::collections::BTreeMap;

/// The host only looks at the first 8 KiB of a file for headers
pub const HEADER_SCAN_BYTES: usize = 8 * 1024;

const KNOWN_HEADERS: &[&str] = &[
    "Plugin Name",
    "Plugin URI",
    "Version",
    "Description",
    "Author",
    "Author URI",
    "Text Domain",
    "Domain Path",
    "Network",
    "Requires at least",
    "Requires PHP",
    "Update URI",
    "Requires Plugins",
    "License",
    "License URI",
];

/// Parsed plugin headers, keyed by canonical header name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginHeaders {
    values: BTreeMap<String, String>,
}

impl PluginHeaders {
    pub fn parse(source: &str) -> Self {
        let head = truncate_to_boundary(source, HEADER_SCAN_BYTES);
        let mut values = BTreeMap::new();

        for raw_line in head.lines() {
            let line = strip_comment_prefix(raw_line);
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let Some(canonical) = KNOWN_HEADERS.iter().find(|h| h.eq_ignore_ascii_case(key))
            else {
                continue;
            };
            // First occurrence wins
            if values.contains_key(*canonical) {
                continue;
            }
            let value = cleanup_header_value(value);
            if !value.is_empty() {
                values.insert((*canonical).to_string(), value);
            }
        }

        Self { values }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.values.get(header).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("Plugin Name")
    }

    pub fn version(&self) -> Option<&str> {
        self.get("Version")
    }

    pub fn license(&self) -> Option<&str> {
        self.get("License")
    }

    /// A PHP file is a plugin main file when it declares a plugin name
    pub fn is_plugin_main_file(&self) -> bool {
        self.name().is_some()
    }
}

fn truncate_to_boundary(source: &str, max: usize) -> &str {
    if source.len() <= max {
        return source;
    }
    let mut end = max;
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    &source[..end]
}

fn strip_comment_prefix(line: &str) -> &str {
    let line = line.trim_start_matches([' ', '\t']);
    let line = line.strip_prefix("<?php").unwrap_or(line);
    line.trim_start_matches([' ', '\t', '/', '*', '#', '@'])
}

fn cleanup_header_value(value: &str) -> String {
    let mut end = value.len();
    for marker in ["*/", "?>"] {
        if let Some(pos) = value.find(marker) {
            end = end.min(pos);
        }
    }
    value[..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN_FILE: &str = "<?php
/**
 * Plugin Name: Test Plugin
 * Version: 1.0.0
 * License: GPLv2 or later
 * Requires PHP: 7.0 */
";

    #[test]
    fn test_parse_docblock_headers() {
        let headers = PluginHeaders::parse(MAIN_FILE);
        assert_eq!(headers.name(), Some("Test Plugin"));
        assert_eq!(headers.version(), Some("1.0.0"));
        assert_eq!(headers.license(), Some("GPLv2 or later"));
        assert_eq!(headers.get("Requires PHP"), Some("7.0"));
        assert!(headers.is_plugin_main_file());
    }

    #[test]
    fn test_non_plugin_file() {
        let headers = PluginHeaders::parse("<?php\nfunction foo() {}\n");
        assert!(!headers.is_plugin_main_file());
    }

    #[test]
    fn test_headers_beyond_scan_window_ignored() {
        let mut source = String::from("<?php\n");
        source.push_str(&"// padding\n".repeat(1000));
        source.push_str("// Plugin Name: Late\n");
        assert!(!PluginHeaders::parse(&source).is_plugin_main_file());
    }
}
