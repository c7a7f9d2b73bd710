// Security checks

pub mod disallowed_calls;

pub use disallowed_calls::{DisallowedRuntimeCallsCheck, DEFAULT_DISALLOWED_FUNCTIONS};
