//! # Deskpilot Runtime
//!
//! Turns model-proposed action requests into executed, recorded results.
//! Validation, the confirmation gate, worker-pool scheduling, timeouts,
//! and outcome classification all live here; what the actions actually do
//! lives in their handlers.

mod history;
mod runtime;

pub use history::ExecutionHistory;
pub use runtime::{DEFAULT_HISTORY_CAPACITY, DEFAULT_TIMEOUT, DEFAULT_WORKERS, ToolRuntime};
