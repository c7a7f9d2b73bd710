// General checks

pub mod runtime_load_errors;

pub use runtime_load_errors::{RuntimeLoadErrorsCheck, DEBUG_REPORTING_PREPARATION};
