// Preparation Stack
// Ordered reversible setup steps; teardown always runs in reverse order

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::port::{HostError, OptionStore, OverrideId};

type CleanupAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

/// Deferred undo of one setup step
pub struct Cleanup {
    name: String,
    action: CleanupAction,
}

impl Cleanup {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(move || action().boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the undo action (consumes the handle)
    pub async fn run(self) -> Result<(), String> {
        (self.action)().await
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup").field("name", &self.name).finish()
    }
}

/// A reversible setup step
#[async_trait]
pub trait Preparation: Send + Sync {
    /// Stable name, used for de-duplication and error reporting
    fn name(&self) -> &str;

    /// Apply the step and hand back its undo action
    async fn prepare(&self) -> Result<Cleanup, HostError>;
}

/// One cleanup step that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub step: String,
    pub reason: String,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.reason)
    }
}

/// Every cleanup step that failed during one teardown
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} cleanup step(s) failed: {}", .failures.len(), join_failures(.failures))]
pub struct CleanupError {
    pub failures: Vec<CleanupFailure>,
}

/// A preparation failed; steps before it were already rolled back
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("preparation '{preparation}' failed: {cause}{}", rollback_suffix(.rollback_failures))]
pub struct SetupError {
    pub preparation: String,
    pub cause: HostError,
    /// Rollback steps that failed, leaving state behind
    pub rollback_failures: Vec<CleanupFailure>,
}

fn join_failures(failures: &[CleanupFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn rollback_suffix(failures: &[CleanupFailure]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(" (rollback incomplete: {})", join_failures(failures))
    }
}

/// Cleanup for a whole stack, consumed by value so it runs at most once
#[must_use = "an aggregate cleanup must be run, dropping it leaves the environment prepared"]
pub struct AggregateCleanup {
    steps: Vec<Cleanup>,
}

impl AggregateCleanup {
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    fn push(&mut self, step: Cleanup) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in reverse registration order
    ///
    /// A failing step does not stop the remaining ones.
    pub async fn run(mut self) -> Result<(), CleanupError> {
        let steps = std::mem::take(&mut self.steps);
        let mut failures = Vec::new();

        for step in steps.into_iter().rev() {
            let name = step.name().to_string();
            debug!(preparation = %name, "Running cleanup");
            if let Err(reason) = step.run().await {
                warn!(preparation = %name, reason = %reason, "Cleanup step failed");
                failures.push(CleanupFailure { step: name, reason });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CleanupError { failures })
        }
    }
}

impl Drop for AggregateCleanup {
    fn drop(&mut self) {
        if !self.steps.is_empty() {
            let pending: Vec<&str> = self.steps.iter().map(|s| s.name()).collect();
            error!(
                pending = ?pending,
                "Aggregate cleanup dropped without running, environment left prepared"
            );
        }
    }
}

impl fmt::Debug for AggregateCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateCleanup")
            .field("steps", &self.steps)
            .finish()
    }
}

/// Runs preparations in order
pub struct PreparationStack;

impl PreparationStack {
    /// Run `preparations` in order and return their combined cleanup
    ///
    /// # Errors
    /// SetupError naming the failing preparation. The cleanups of the steps
    /// that already succeeded have run in reverse order by then.
    pub async fn run(
        preparations: &[Arc<dyn Preparation>],
    ) -> Result<AggregateCleanup, SetupError> {
        let mut cleanup = AggregateCleanup::empty();

        for preparation in preparations {
            debug!(preparation = preparation.name(), "Running preparation");
            match preparation.prepare().await {
                Ok(step) => cleanup.push(step),
                Err(cause) => {
                    error!(
                        preparation = preparation.name(),
                        error = %cause,
                        rollback_steps = cleanup.len(),
                        "Preparation failed, rolling back"
                    );
                    let rollback_failures = match cleanup.run().await {
                        Ok(()) => Vec::new(),
                        Err(e) => e.failures,
                    };
                    return Err(SetupError {
                        preparation: preparation.name().to_string(),
                        cause,
                        rollback_failures,
                    });
                }
            }
        }

        Ok(cleanup)
    }
}

/// Registers a fixed set of option overrides for the duration of a run
pub struct OverridePreparation {
    name: String,
    options: Arc<dyn OptionStore>,
    overrides: Vec<(String, Value)>,
}

impl OverridePreparation {
    pub fn new(
        name: impl Into<String>,
        options: Arc<dyn OptionStore>,
        overrides: Vec<(String, Value)>,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            overrides,
        }
    }
}

#[async_trait]
impl Preparation for OverridePreparation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn prepare(&self) -> Result<Cleanup, HostError> {
        let ids: Vec<OverrideId> = self
            .overrides
            .iter()
            .map(|(key, value)| self.options.add_override(key, value.clone()))
            .collect();

        let options = Arc::clone(&self.options);
        Ok(Cleanup::new(self.name.clone(), move || async move {
            let missing = ids
                .into_iter()
                .filter(|id| !options.remove_override(*id))
                .count();
            if missing == 0 {
                Ok(())
            } else {
                Err(format!("{} override(s) already removed", missing))
            }
        }))
    }
}
