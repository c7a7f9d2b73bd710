// Application Layer - Check orchestration use cases

pub mod bootstrap;
pub mod cancel;
pub mod check;
pub mod constants;
pub mod environment;
pub mod orchestrator;
mod panic_guard;
pub mod preparation;

// Re-exports
pub use bootstrap::{EnvironmentBootstrap, EnvironmentSnapshot};
pub use cancel::{cancel_channel, CancelSender, CancelToken};
pub use check::{
    CheckCategory, CheckError, CheckKind, CheckRegistry, CheckSelection, RegisteredCheck,
    RuntimeCheck, StaticCheck,
};
pub use environment::RuntimeEnvironment;
pub use orchestrator::{CheckOrchestrator, OrchestratorConfig};
pub use panic_guard::{execute_guarded, PanicGuardResult};
pub use preparation::{
    AggregateCleanup, Cleanup, CleanupError, CleanupFailure, OverridePreparation, Preparation,
    PreparationStack, SetupError,
};
