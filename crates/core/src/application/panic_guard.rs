// Panic isolation for check execution
use std::any::Any;
use std::panic::catch_unwind;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// Execute a closure with panic isolation
///
/// A panicking check is reported as PanicGuardResult::Panicked instead of
/// tearing down the run.
pub fn execute_guarded<F, T>(f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T + std::panic::UnwindSafe,
{
    match catch_unwind(f) {
        Ok(result) => PanicGuardResult::Success(result),
        Err(payload) => {
            let panic_msg = panic_message(payload.as_ref());
            error!(panic_msg = %panic_msg, "Check panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_passes_value_through() {
        match execute_guarded(|| 42) {
            PanicGuardResult::Success(v) => assert_eq!(v, 42),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_str_and_string_payloads() {
        match execute_guarded(|| panic!("boom")) {
            PanicGuardResult::<()>::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected {:?}", other),
        }

        let code = 7;
        match execute_guarded(move || panic!("code {}", code)) {
            PanicGuardResult::<()>::Panicked(msg) => assert_eq!(msg, "code 7"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
