//! Validator execution: retry, isolation, deadlines

pub mod executor;
pub mod retry;

pub use executor::{ExecutionCoordinator, RunOutcome, ToolInvocation, ToolOutcome};
pub use retry::{retry_with_backoff, Attempted, RetryPolicy};
