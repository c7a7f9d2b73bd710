// Check Contract & Registry
// Two variants selected by a capability tag at registration: static (source only) and runtime (live host)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::application::environment::RuntimeEnvironment;
use crate::application::preparation::Preparation;
use crate::domain::{CheckContext, CheckResult, DomainError};
use crate::port::{HostError, HostSession};

/// A check failed to execute (never a finding)
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("{0}")]
    Failed(String),
}

impl CheckError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CheckError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Source-only check, safe to run concurrently with other static checks
pub trait StaticCheck: Send + Sync {
    fn run(&self, context: &CheckContext, result: &CheckResult) -> Result<(), CheckError>;
}

/// Check that observes the plugin inside the isolated host environment
///
/// Runtime checks run strictly one at a time, after every preparation and
/// before any cleanup.
#[async_trait]
pub trait RuntimeCheck: Send + Sync {
    /// Extra preparations this check needs after the bootstrap
    ///
    /// Preparations are de-duplicated by name across the selected checks.
    fn preparations(
        &self,
        _context: &CheckContext,
        _session: &HostSession,
    ) -> Vec<Arc<dyn Preparation>> {
        Vec::new()
    }

    async fn run(
        &self,
        context: &CheckContext,
        environment: &RuntimeEnvironment,
        result: &CheckResult,
    ) -> Result<(), CheckError>;
}

/// Declared capability of a registered check
#[derive(Clone)]
pub enum CheckKind {
    Static(Arc<dyn StaticCheck>),
    Runtime(Arc<dyn RuntimeCheck>),
}

impl CheckKind {
    pub fn is_runtime(&self) -> bool {
        matches!(self, CheckKind::Runtime(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::Static(_) => "static",
            CheckKind::Runtime(_) => "runtime",
        }
    }
}

impl fmt::Debug for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Check category used for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    General,
    PluginRepo,
    Security,
    Performance,
    Accessibility,
}

impl CheckCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCategory::General => "general",
            CheckCategory::PluginRepo => "plugin_repo",
            CheckCategory::Security => "security",
            CheckCategory::Performance => "performance",
            CheckCategory::Accessibility => "accessibility",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(CheckCategory::General),
            "plugin_repo" => Ok(CheckCategory::PluginRepo),
            "security" => Ok(CheckCategory::Security),
            "performance" => Ok(CheckCategory::Performance),
            "accessibility" => Ok(CheckCategory::Accessibility),
            other => Err(DomainError::ValidationError(format!(
                "unknown check category: {}",
                other
            ))),
        }
    }
}

/// A check bound to its stable slug
#[derive(Debug, Clone)]
pub struct RegisteredCheck {
    slug: String,
    categories: Vec<CheckCategory>,
    kind: CheckKind,
}

impl RegisteredCheck {
    pub fn new(slug: impl Into<String>, categories: Vec<CheckCategory>, kind: CheckKind) -> Self {
        Self {
            slug: slug.into(),
            categories,
            kind,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn categories(&self) -> &[CheckCategory] {
        &self.categories
    }

    pub fn kind(&self) -> &CheckKind {
        &self.kind
    }

    pub fn is_runtime(&self) -> bool {
        self.kind.is_runtime()
    }
}

/// Which checks a run should execute
#[derive(Debug, Clone, Default)]
pub struct CheckSelection {
    /// Only these slugs (empty = all)
    pub include: Vec<String>,
    /// Never these slugs
    pub exclude: Vec<String>,
    /// Keep checks in any of these categories (empty = all)
    pub categories: Vec<CheckCategory>,
}

/// Checks keyed by slug
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    checks: BTreeMap<String, RegisteredCheck>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check
    ///
    /// # Errors
    /// DomainError::DuplicateCheck if the slug is taken
    pub fn register(&mut self, check: RegisteredCheck) -> crate::domain::error::Result<()> {
        if self.checks.contains_key(check.slug()) {
            return Err(DomainError::DuplicateCheck(check.slug().to_string()));
        }
        self.checks.insert(check.slug().to_string(), check);
        Ok(())
    }

    pub fn register_static(
        &mut self,
        slug: &str,
        categories: Vec<CheckCategory>,
        check: impl StaticCheck + 'static,
    ) -> crate::domain::error::Result<()> {
        self.register(RegisteredCheck::new(
            slug,
            categories,
            CheckKind::Static(Arc::new(check)),
        ))
    }

    pub fn register_runtime(
        &mut self,
        slug: &str,
        categories: Vec<CheckCategory>,
        check: impl RuntimeCheck + 'static,
    ) -> crate::domain::error::Result<()> {
        self.register(RegisteredCheck::new(
            slug,
            categories,
            CheckKind::Runtime(Arc::new(check)),
        ))
    }

    pub fn get(&self, slug: &str) -> Option<&RegisteredCheck> {
        self.checks.get(slug)
    }

    /// All checks in slug order
    pub fn all(&self) -> Vec<RegisteredCheck> {
        self.checks.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Resolve a selection into checks, in slug order
    ///
    /// # Errors
    /// DomainError::UnknownCheck listing every included or excluded slug
    /// that is not registered
    pub fn select(
        &self,
        selection: &CheckSelection,
    ) -> crate::domain::error::Result<Vec<RegisteredCheck>> {
        let unknown: BTreeSet<String> = selection
            .include
            .iter()
            .chain(selection.exclude.iter())
            .filter(|slug| !self.checks.contains_key(slug.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(DomainError::UnknownCheck(unknown.into_iter().collect()));
        }

        let selected = self
            .checks
            .values()
            .filter(|c| selection.include.is_empty() || selection.include.iter().any(|s| s == c.slug()))
            .filter(|c| !selection.exclude.iter().any(|s| s == c.slug()))
            .filter(|c| {
                selection.categories.is_empty()
                    || c.categories().iter().any(|cat| selection.categories.contains(cat))
            })
            .cloned()
            .collect();

        Ok(selected)
    }
}
