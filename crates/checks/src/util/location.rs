// Host-reported locations mapped onto plugin-relative files

use std::path::Path;

use plugin_check_core::domain::CheckContext;

/// `(file, line)` of a host-reported location
///
/// Locations outside the plugin are attributed to the main file, line 0.
pub fn plugin_location(context: &CheckContext, file: Option<&Path>, line: u32) -> (String, u32) {
    match file {
        Some(path) if path.starts_with(context.plugin_root()) => (context.relative_path(path), line),
        _ => (context.relative_path(context.main_file()), 0),
    }
}

/// Whether the host-reported file belongs to the plugin
pub fn is_plugin_file(context: &CheckContext, file: Option<&Path>) -> bool {
    file.map(|p| p.starts_with(context.plugin_root()))
        .unwrap_or(false)
}
