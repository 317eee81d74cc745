//! Values that flow through both interpreters: memory, routing tokens, steps,
//! snapshots, run limits, and the execution log.

mod execution_log;
mod run_options;
mod snapshot;
mod step;
mod token;

pub use execution_log::{EXECUTION_LOG_VERSION, ExecutionLog, ExecutionRecorder, LogEntry};
pub(crate) use run_options::{Budget, block_on};
pub use run_options::{DEFAULT_MAX_STEPS, RunOptions};
pub use snapshot::Snapshot;
pub(crate) use step::EMPTY_DELTA_STREAM;
pub use step::{Delta, DeltaStream, Step, StepError, StepOutput, from_async, from_fn};
pub use token::Token;

/// State threaded through every step: an opaque JSON object.
pub type Memory = serde_json::Map<String, serde_json::Value>;
