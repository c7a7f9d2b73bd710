// Check Context - immutable description of the inspection target

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::domain::error::{DomainError, Result};

/// Inspection target for one run.
///
/// Built once (usually by the discovery adapter) and shared read-only
/// between checks via `Arc<CheckContext>`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckContext {
    main_file: PathBuf,
    plugin_root: PathBuf,
    slug: String,
    basename: String,
    files: Vec<PathBuf>,
    single_file: bool,
}

impl CheckContext {
    /// Context for a plugin living in its own directory.
    ///
    /// The slug is the directory name, the basename is `slug/main.php`.
    pub fn for_directory(main_file: impl Into<PathBuf>, files: Vec<PathBuf>) -> Result<Self> {
        let main_file = main_file.into();
        let plugin_root = parent_of(&main_file)?;
        let slug = file_name_of(&plugin_root)?;
        let main_name = file_name_of(&main_file)?;

        let mut files: Vec<PathBuf> = files
            .into_iter()
            .filter(|f| f.starts_with(&plugin_root))
            .collect();
        if !files.contains(&main_file) {
            files.push(main_file.clone());
        }
        files.sort();
        files.dedup();

        Ok(Self {
            basename: format!("{}/{}", slug, main_name),
            main_file,
            plugin_root,
            slug,
            files,
            single_file: false,
        })
    }

    /// Context for a plugin that consists of one PHP file.
    pub fn for_single_file(main_file: impl Into<PathBuf>) -> Result<Self> {
        let main_file = main_file.into();
        let plugin_root = parent_of(&main_file)?;
        let basename = file_name_of(&main_file)?;
        let slug = main_file
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                DomainError::InvalidContext(format!("no file stem: {}", main_file.display()))
            })?;

        Ok(Self {
            files: vec![main_file.clone()],
            main_file,
            plugin_root,
            slug,
            basename,
            single_file: true,
        })
    }

    pub fn main_file(&self) -> &Path {
        &self.main_file
    }

    pub fn plugin_root(&self) -> &Path {
        &self.plugin_root
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Host-facing plugin identifier (`slug/main.php` or `single.php`)
    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn is_single_file(&self) -> bool {
        self.single_file
    }

    /// Source files with the given extension (case-insensitive)
    pub fn files_with_extension<'a>(&'a self, ext: &'a str) -> impl Iterator<Item = &'a PathBuf> {
        self.files.iter().filter(move |f| {
            f.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(ext))
                .unwrap_or(false)
        })
    }

    /// Path relative to the plugin root with forward slashes.
    ///
    /// Paths outside the root are returned unchanged.
    pub fn relative_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.plugin_root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn parent_of(main_file: &Path) -> Result<PathBuf> {
    if !main_file.is_absolute() {
        return Err(DomainError::InvalidContext(format!(
            "main file must be an absolute path: {}",
            main_file.display()
        )));
    }
    main_file
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| DomainError::InvalidContext(format!("no parent: {}", main_file.display())))
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| DomainError::InvalidContext(format!("no file name: {}", path.display())))
}
