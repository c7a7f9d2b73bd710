// Plugin discovery
// Turns a path on disk into a CheckContext: enumerate sources, find the main file
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use plugin_check_core::domain::plugin_header::HEADER_SCAN_BYTES;
use plugin_check_core::domain::{CheckContext, DomainError, PluginHeaders};

/// Directories never treated as plugin sources
const SKIPPED_DIRS: &[&str] = &[".git", "vendor", "node_modules"];

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Plugin path not found: {0}")]
    NotFound(PathBuf),

    #[error("No PHP file with a Plugin Name header directly inside {0}")]
    NoMainFile(PathBuf),

    #[error("Not a PHP file: {0}")]
    NotPhp(PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Context(#[from] DomainError),
}

/// Build the check context for a plugin directory or a single-file plugin
///
/// # Errors
/// - DiscoveryError::NotFound if `path` does not exist
/// - DiscoveryError::NoMainFile if no top-level PHP file declares `Plugin Name`
pub fn discover_plugin(path: &Path) -> Result<CheckContext, DiscoveryError> {
    let path = path
        .canonicalize()
        .map_err(|_| DiscoveryError::NotFound(path.to_path_buf()))?;

    if path.is_file() {
        if !is_php(&path) {
            return Err(DiscoveryError::NotPhp(path));
        }
        return Ok(CheckContext::for_single_file(path)?);
    }

    let files = enumerate_files(&path);
    let main_file = find_main_file(&path, &files)?;
    debug!(
        main_file = %main_file.display(),
        files = files.len(),
        "Plugin discovered"
    );

    Ok(CheckContext::for_directory(main_file, files)?)
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

fn is_php(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("php"))
        .unwrap_or(false)
}

fn enumerate_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    // Stable order.
    files.sort();
    files
}

/// First top-level PHP file (by name) carrying a Plugin Name header
fn find_main_file(root: &Path, files: &[PathBuf]) -> Result<PathBuf, DiscoveryError> {
    for file in files
        .iter()
        .filter(|f| f.parent() == Some(root) && is_php(f))
    {
        if read_headers(file)?.is_plugin_main_file() {
            return Ok(file.clone());
        }
    }
    Err(DiscoveryError::NoMainFile(root.to_path_buf()))
}

fn read_headers(path: &Path) -> Result<PluginHeaders, DiscoveryError> {
    let io_err = |source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut head = Vec::with_capacity(HEADER_SCAN_BYTES);
    File::open(path)
        .map_err(io_err)?
        .take(HEADER_SCAN_BYTES as u64)
        .read_to_end(&mut head)
        .map_err(io_err)?;
    Ok(PluginHeaders::parse(&String::from_utf8_lossy(&head)))
}
