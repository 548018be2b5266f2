//! Error types for the scheduler and the executions it drives.

use std::error::Error as StdError;

/// Fault raised by a task's execution while it was being resumed.
///
/// Returning one of these from [`Execution::resume`](crate::Execution::resume)
/// (or from the future behind [`FutureExecution`](crate::FutureExecution))
/// aborts the whole scheduler run.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Plain message
    #[error("{0}")]
    Message(String),

    /// Any other error raised by user code
    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl ExecutionError {
    /// Build an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        ExecutionError::Message(message.into())
    }
}

/// Errors returned by [`Scheduler::run`](crate::Scheduler::run).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A task's execution faulted; the loop was aborted
    #[error("task '{name}' failed: {source}")]
    TaskFailed {
        /// Name of the faulting task
        name: String,
        /// The fault itself
        #[source]
        source: ExecutionError,
    },

    /// The configured cycle budget ran out before the queue drained
    #[error("scheduler did not drain its queue within {limit} cycles")]
    CycleLimitExceeded {
        /// Configured `max_cycles`
        limit: u64,
    },

    /// `run` was called on a scheduler whose loop is already running
    #[error("scheduler loop is already running")]
    AlreadyRunning,
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
