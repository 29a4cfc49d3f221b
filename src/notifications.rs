//! Append-only, id-addressed log of user-facing messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::TaskId;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Ok,
    Warning,
    Error,
}

/// One user-facing message tied to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub time: DateTime<Utc>,
    pub task_id: TaskId,
    pub content: String,
    pub level: NotificationLevel,
}

/// Append-only notification storage. Deleting clears the slot but never
/// reclaims the id, so ids handed to observers stay stable forever.
#[derive(Debug, Default)]
pub struct NotificationLog {
    slots: Vec<Option<Notification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notification and return its id.
    pub fn post(
        &mut self,
        task_id: TaskId,
        content: impl Into<String>,
        level: NotificationLevel,
    ) -> (u32, Notification) {
        let notification = Notification {
            time: Utc::now(),
            task_id,
            content: content.into(),
            level,
        };
        let id = self.slots.len() as u32;
        self.slots.push(Some(notification.clone()));
        (id, notification)
    }

    /// Clear a slot. Returns false when the id was never issued or the slot
    /// is already empty.
    pub fn clear(&mut self, id: u32) -> bool {
        match self.slots.get_mut(id as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Notification> {
        self.slots.get(id as usize).and_then(|slot| slot.as_ref())
    }

    /// All live notifications with their ids, oldest first.
    pub fn active(&self) -> Vec<(u32, Notification)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|n| (id as u32, n.clone())))
            .collect()
    }
}
