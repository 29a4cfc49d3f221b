//! Observable side effects of the queue.
//!
//! Every mutation the service performs is pushed through a
//! `tokio::sync::broadcast` channel as one of these events; the UI layer and
//! other observers subscribe and never reach into queue state directly.

use serde::Serialize;

use crate::notifications::Notification;
use crate::progress::StatusSample;
use crate::state::{TaskId, TaskSnapshot, WorkingStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// The set of task ids changed (creation or deletion), ascending order.
    TaskListChanged { ids: Vec<TaskId> },
    /// A task's visible state changed.
    TaskUpdated { id: TaskId, task: TaskSnapshot },
    /// A progress measurement was recorded at run offset `time`. The start
    /// of a run emits one with no status attached; that initial event carries
    /// the absolute wall-clock start instant in `time`, not a run offset.
    ProgressSample {
        id: TaskId,
        time: f64,
        status: Option<StatusSample>,
    },
    /// Runner output text was appended to (or replaced) a task's console.
    ConsoleAppend {
        id: TaskId,
        text: String,
        append: bool,
    },
    /// A notification was posted to the log.
    NotificationPosted {
        id: u32,
        notification: Notification,
    },
    /// A notification slot was cleared.
    NotificationCleared { id: u32 },
    /// The derived queue-wide status actually changed.
    WorkingStatusChanged { value: WorkingStatus },
    /// The runner executable reported its version banner.
    RunnerVersionReported { text: String },
}
