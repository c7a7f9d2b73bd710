// Check Orchestrator
// Preparations -> static checks (bounded pool) -> runtime checks (sequential) -> cleanup, always

use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::application::bootstrap::EnvironmentBootstrap;
use crate::application::cancel::CancelToken;
use crate::application::check::{CheckError, CheckKind, RegisteredCheck, RuntimeCheck, StaticCheck};
use crate::application::constants::{
    DEFAULT_MAX_PARALLEL_STATIC, DEFAULT_NAMESPACE_BASE, DEFAULT_THEME,
};
use crate::application::environment::RuntimeEnvironment;
use crate::application::panic_guard::{execute_guarded, panic_message, PanicGuardResult};
use crate::application::preparation::{AggregateCleanup, Preparation, PreparationStack};
use crate::domain::{CheckContext, CheckResult};
use crate::error::{AppError, Result};
use crate::port::{HostConnector, HostSession, IdProvider};

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on concurrently running static checks
    pub max_parallel_static: usize,
    /// Limit for the whole check execution phase (None = unbounded)
    pub run_timeout: Option<Duration>,
    /// Theme forced inside the isolated environment
    pub default_theme: String,
    /// Storage namespace prefix base, a run id is appended
    pub namespace_base: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel_static: DEFAULT_MAX_PARALLEL_STATIC,
            run_timeout: None,
            default_theme: DEFAULT_THEME.to_string(),
            namespace_base: DEFAULT_NAMESPACE_BASE.to_string(),
        }
    }
}

type CheckOutcome = PanicGuardResult<std::result::Result<(), CheckError>>;

/// Runs a set of checks against one plugin
pub struct CheckOrchestrator {
    config: OrchestratorConfig,
    host: Option<Arc<dyn HostConnector>>,
    id_provider: Arc<dyn IdProvider>,
}

impl CheckOrchestrator {
    /// Create an orchestrator
    ///
    /// `host` may be None when only static checks will ever be selected.
    pub fn new(
        config: OrchestratorConfig,
        host: Option<Arc<dyn HostConnector>>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            config,
            host,
            id_provider,
        }
    }

    pub async fn run(
        &self,
        context: Arc<CheckContext>,
        checks: Vec<RegisteredCheck>,
    ) -> Result<CheckResult> {
        self.run_with_cancel(context, checks, CancelToken::never())
            .await
    }

    /// Run checks, aborting the check phase on cancellation or timeout
    ///
    /// Cleanup runs whenever preparation succeeded, whatever happens to the checks.
    ///
    /// # Errors
    /// - AppError::Setup if a preparation failed (already rolled back)
    /// - AppError::TimedOut / AppError::Cancelled if the check phase was aborted
    /// - AppError::Cleanup if teardown left state behind
    pub async fn run_with_cancel(
        &self,
        context: Arc<CheckContext>,
        checks: Vec<RegisteredCheck>,
        mut cancel: CancelToken,
    ) -> Result<CheckResult> {
        let started = Instant::now();
        let mut static_checks = Vec::new();
        let mut runtime_checks = Vec::new();
        for check in checks {
            match check.kind() {
                CheckKind::Static(c) => static_checks.push((check.slug().to_string(), Arc::clone(c))),
                CheckKind::Runtime(c) => {
                    runtime_checks.push((check.slug().to_string(), Arc::clone(c)))
                }
            }
        }

        info!(
            plugin = %context.slug(),
            static_checks = static_checks.len(),
            runtime_checks = runtime_checks.len(),
            "Starting check run"
        );

        let (cleanup, environment) = if runtime_checks.is_empty() {
            (AggregateCleanup::empty(), None)
        } else {
            let (cleanup, environment) = self.prepare_runtime(&context, &runtime_checks).await?;
            (cleanup, Some(environment))
        };

        let result = Arc::new(CheckResult::new());
        let mut runtime_slot = RuntimeSlot::default();
        let phase = execute_checks(
            &context,
            &result,
            static_checks,
            runtime_checks,
            environment,
            self.config.max_parallel_static,
            &mut runtime_slot,
        );
        let bounded = async {
            match self.config.run_timeout {
                Some(limit) => tokio::time::timeout(limit, phase)
                    .await
                    .map_err(|_| AppError::TimedOut {
                        timeout_ms: limit.as_millis() as u64,
                    }),
                None => {
                    phase.await;
                    Ok(())
                }
            }
        };
        let outcome = tokio::select! {
            outcome = bounded => outcome,
            _ = cancel.cancelled() => Err(AppError::Cancelled),
        };

        // Teardown must not start while an aborted runtime check is still executing
        if let Err(run_err) = &outcome {
            runtime_slot.abort_and_drain(&result, run_err).await;
        }

        let cleanup_outcome = cleanup.run().await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match (outcome, cleanup_outcome) {
            (Ok(()), Ok(())) => {
                let result = Arc::try_unwrap(result).unwrap_or_else(|shared| (*shared).clone());
                info!(
                    plugin = %context.slug(),
                    errors = result.get_error_count(),
                    warnings = result.get_warning_count(),
                    failed_checks = result.failed_checks().len(),
                    duration_ms = duration_ms,
                    "Check run completed"
                );
                Ok(result)
            }
            (Ok(()), Err(cleanup_err)) => {
                error!(error = %cleanup_err, duration_ms = duration_ms, "Cleanup failed");
                Err(cleanup_err.into())
            }
            (Err(run_err), cleanup_outcome) => {
                if let Err(cleanup_err) = cleanup_outcome {
                    error!(error = %cleanup_err, "Cleanup failed after aborted run");
                }
                warn!(error = %run_err, duration_ms = duration_ms, "Check run aborted");
                Err(run_err)
            }
        }
    }

    /// Open a host session and run the bootstrap plus shared preparations
    async fn prepare_runtime(
        &self,
        context: &CheckContext,
        runtime_checks: &[(String, Arc<dyn RuntimeCheck>)],
    ) -> Result<(AggregateCleanup, Arc<RuntimeEnvironment>)> {
        let host = self.host.as_ref().ok_or_else(|| {
            AppError::Config("runtime checks selected but no host is configured".to_string())
        })?;
        let session = host.connect().await?;
        let prefix = format!(
            "{}{}_",
            self.config.namespace_base,
            self.id_provider.generate_id()
        );

        let mut preparations: Vec<Arc<dyn Preparation>> = vec![Arc::new(
            EnvironmentBootstrap::new(
                session.clone(),
                context.basename(),
                prefix.clone(),
                self.config.default_theme.clone(),
            ),
        )];
        preparations.extend(shared_preparations(runtime_checks, context, &session));

        let cleanup = PreparationStack::run(&preparations).await?;
        Ok((cleanup, Arc::new(RuntimeEnvironment::new(session, prefix))))
    }
}

/// Preparations declared by runtime checks, first declaration per name wins
fn shared_preparations(
    runtime_checks: &[(String, Arc<dyn RuntimeCheck>)],
    context: &CheckContext,
    session: &HostSession,
) -> Vec<Arc<dyn Preparation>> {
    let mut seen = BTreeSet::new();
    runtime_checks
        .iter()
        .flat_map(|(_, check)| check.preparations(context, session))
        .filter(|prep| seen.insert(prep.name().to_string()))
        .collect()
}

async fn execute_checks(
    context: &Arc<CheckContext>,
    result: &Arc<CheckResult>,
    static_checks: Vec<(String, Arc<dyn StaticCheck>)>,
    runtime_checks: Vec<(String, Arc<dyn RuntimeCheck>)>,
    environment: Option<Arc<RuntimeEnvironment>>,
    max_parallel_static: usize,
    runtime_slot: &mut RuntimeSlot,
) {
    run_static_checks(context, result, static_checks, max_parallel_static).await;
    if let Some(environment) = environment {
        run_runtime_checks(context, result, runtime_checks, &environment, runtime_slot).await;
    }
}

async fn run_static_checks(
    context: &Arc<CheckContext>,
    result: &Arc<CheckResult>,
    checks: Vec<(String, Arc<dyn StaticCheck>)>,
    max_parallel: usize,
) {
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut tasks = JoinSet::new();
    let mut slugs = HashMap::new();

    for (slug, check) in checks {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let context = Arc::clone(context);
        let task_result = Arc::clone(result);
        let task_slug = slug.clone();
        let handle = tasks.spawn_blocking(move || {
            let _permit = permit;
            let started = Instant::now();
            let outcome =
                execute_guarded(AssertUnwindSafe(|| check.run(&context, &task_result)));
            (task_slug, outcome, started.elapsed())
        });
        slugs.insert(handle.id(), slug);
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slug, outcome, elapsed)) => record_outcome(result, &slug, outcome, elapsed),
            Err(join_err) => record_lost_task(result, &slugs, join_err),
        }
    }
}

fn record_lost_task(result: &CheckResult, slugs: &HashMap<task::Id, String>, join_err: JoinError) {
    let slug = slugs
        .get(&join_err.id())
        .map(String::as_str)
        .unwrap_or("unknown");
    error!(check = %slug, error = %join_err, "Static check task lost");
    result.record_failure(slug, format!("check task lost: {}", join_err));
}

/// Holds the runtime check in flight outside the bounded check phase
#[derive(Default)]
struct RuntimeSlot {
    tasks: JoinSet<std::result::Result<(), CheckError>>,
    current: Option<(String, Instant)>,
}

impl RuntimeSlot {
    /// Abort the check in flight and wait until it has actually stopped
    async fn abort_and_drain(&mut self, result: &CheckResult, reason: &AppError) {
        self.tasks.abort_all();
        while let Some(joined) = self.tasks.join_next().await {
            let Some((slug, started)) = self.current.take() else {
                continue;
            };
            match joined {
                Ok(outcome) => record_outcome(
                    result,
                    &slug,
                    PanicGuardResult::Success(outcome),
                    started.elapsed(),
                ),
                Err(_) => {
                    warn!(
                        check = %slug,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Runtime check aborted"
                    );
                    result.record_failure(&slug, format!("check aborted: {}", reason));
                }
            }
        }
    }
}

async fn run_runtime_checks(
    context: &Arc<CheckContext>,
    result: &Arc<CheckResult>,
    checks: Vec<(String, Arc<dyn RuntimeCheck>)>,
    environment: &Arc<RuntimeEnvironment>,
    slot: &mut RuntimeSlot,
) {
    for (slug, check) in checks {
        let context = Arc::clone(context);
        let task_result = Arc::clone(result);
        let environment = Arc::clone(environment);

        slot.current = Some((slug, Instant::now()));
        slot.tasks
            .spawn(async move { check.run(&context, &environment, &task_result).await });

        let joined = slot.tasks.join_next().await;
        let Some((slug, started)) = slot.current.take() else {
            continue;
        };
        let outcome = match joined {
            Some(Ok(outcome)) => PanicGuardResult::Success(outcome),
            Some(Err(join_err)) if join_err.is_panic() => {
                let panic_msg = panic_message(join_err.into_panic().as_ref());
                error!(check = %slug, panic_msg = %panic_msg, "Check panicked");
                PanicGuardResult::Panicked(panic_msg)
            }
            Some(Err(join_err)) => {
                PanicGuardResult::Success(Err(CheckError::Failed(join_err.to_string())))
            }
            None => continue,
        };
        record_outcome(result, &slug, outcome, started.elapsed());
    }
}

fn record_outcome(result: &CheckResult, slug: &str, outcome: CheckOutcome, elapsed: Duration) {
    let duration_ms = elapsed.as_millis() as u64;
    match outcome {
        PanicGuardResult::Success(Ok(())) => {
            debug!(check = %slug, duration_ms = duration_ms, "Check completed");
        }
        PanicGuardResult::Success(Err(e)) => {
            warn!(check = %slug, error = %e, duration_ms = duration_ms, "Check failed to execute");
            result.record_failure(slug, e.to_string());
        }
        PanicGuardResult::Panicked(msg) => {
            result.record_failure(slug, format!("check panicked: {}", msg));
        }
    }
}
