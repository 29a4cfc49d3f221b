//! Error types for queue operations.
//!
//! Both variants are caller-misuse errors and are reported synchronously.
//! Process-originated failures (probe errors, run failures) never surface
//! here; they are reported asynchronously through notifications and task
//! update events, and the queue keeps working.

use crate::state::{TaskId, TaskStatus};

/// Error type for task store and scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The referenced task id is absent from the store. Not retryable:
    /// the caller is holding a stale id.
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// The requested operation's state guard failed. Indicates a caller
    /// logic error; the caller must re-read the current status instead of
    /// retrying blindly.
    #[error("Invalid transition: cannot {op} task {id} while {status:?}")]
    InvalidTransition {
        id: TaskId,
        op: &'static str,
        status: TaskStatus,
    },
}

pub type Result<T> = std::result::Result<T, QueueError>;
