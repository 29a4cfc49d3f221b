//! Task store: owns the collection of task records.
//!
//! The store is the single owner of all task state; the scheduler and every
//! external caller read and mutate tasks through it. Ids are dense integers
//! assigned monotonically, and iteration order is always ascending id, so
//! nothing relies on incidental map order. The "default parameters" value
//! that seeds new tasks lives next to the map, not inside it, so it can never
//! be scheduled or counted.

mod types;

pub use types::*;

use std::collections::BTreeMap;

use crate::error::{QueueError, Result};

#[derive(Default)]
pub struct TaskStore {
    tasks: BTreeMap<TaskId, Task>,
    next_id: TaskId,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a task record and return its id.
    pub fn insert(&mut self, name: &str, params: OutputParams) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert(id, Task::new(id, name, params));
        id
    }

    /// Remove a task record. The caller checks the deletion guard first.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn get(&self, id: TaskId) -> Result<&Task> {
        self.tasks.get(&id).ok_or(QueueError::NotFound(id))
    }

    pub fn get_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(&id).ok_or(QueueError::NotFound(id))
    }

    pub fn try_get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn try_get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// All ids, ascending.
    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.keys().copied().collect()
    }

    /// Tasks in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.tasks.iter().map(|(id, task)| (*id, task))
    }

    /// Position of a task within the ascending-id order.
    pub fn position_of(&self, id: TaskId) -> Option<usize> {
        self.tasks.keys().position(|k| *k == id)
    }

    /// Number of tasks currently `Running`.
    pub fn running_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .count()
    }

    /// Number of tasks in any queue-active state.
    pub fn queue_count(&self) -> usize {
        self.tasks.values().filter(|t| t.status.in_queue()).count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_params(path: &str) -> OutputParams {
        OutputParams {
            input: Some(path.into()),
            ..OutputParams::default()
        }
    }

    #[test]
    fn ids_are_monotonic_even_after_removal() {
        let mut store = TaskStore::new();
        let a = store.insert("a.mkv", local_params("/media/a.mkv"));
        let b = store.insert("b.mkv", local_params("/media/b.mkv"));
        assert_eq!((a, b), (0, 1));

        store.remove(a);
        let c = store.insert("c.mkv", local_params("/media/c.mkv"));
        assert_eq!(c, 2);
    }

    #[test]
    fn iteration_is_ascending_by_id() {
        let mut store = TaskStore::new();
        for i in 0..5 {
            store.insert(&format!("t{i}"), local_params("/media/in.mkv"));
        }
        store.remove(2);
        let ids: Vec<_> = store.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0, 1, 3, 4]);
        assert_eq!(store.position_of(3), Some(2));
        assert_eq!(store.position_of(2), None);
    }

    #[test]
    fn missing_id_is_not_found() {
        let mut store = TaskStore::new();
        assert!(matches!(store.get(7), Err(QueueError::NotFound(7))));
        assert!(matches!(store.get_mut(7), Err(QueueError::NotFound(7))));
    }

    #[test]
    fn counts_follow_statuses() {
        let mut store = TaskStore::new();
        let a = store.insert("a", local_params("/media/a.mkv"));
        let b = store.insert("b", local_params("/media/b.mkv"));
        let c = store.insert("c", local_params("/media/c.mkv"));

        store.get_mut(a).unwrap().status = TaskStatus::Running;
        store.get_mut(b).unwrap().status = TaskStatus::Paused;
        store.get_mut(c).unwrap().status = TaskStatus::Stopping;
        assert_eq!(store.running_count(), 1);
        assert_eq!(store.queue_count(), 3);

        store.get_mut(a).unwrap().status = TaskStatus::Finished;
        assert_eq!(store.running_count(), 0);
        assert_eq!(store.queue_count(), 2);
    }

    #[test]
    fn local_tasks_start_stopped_remote_tasks_initializing() {
        let mut store = TaskStore::new();
        let local = store.insert("a", local_params("/media/a.mkv"));
        let remote = store.insert("b", OutputParams::default());

        assert_eq!(store.get(local).unwrap().status, TaskStatus::Stopped);
        assert!(store.get(local).unwrap().output_file.is_none());

        let remote_task = store.get(remote).unwrap();
        assert_eq!(remote_task.status, TaskStatus::Initializing);
        assert!(remote_task.is_remote);
        let output = remote_task.output_file.as_deref().unwrap();
        assert!(output.ends_with(".mp4"), "unexpected output name {output}");
    }

    #[test]
    fn transition_guard_names_the_operation() {
        let mut store = TaskStore::new();
        let id = store.insert("a", local_params("/media/a.mkv"));
        let task = store.get_mut(id).unwrap();

        assert!(task
            .ensure("start", &[TaskStatus::Stopped, TaskStatus::Error])
            .is_ok());
        let err = task.ensure("pause", &[TaskStatus::Running]).unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidTransition {
                id: 0,
                op: "pause",
                status: TaskStatus::Stopped,
            }
        ));
    }

    #[test]
    fn command_args_cover_rate_control_modes() {
        let mut params = local_params("/media/clip.mkv");
        params.video.rate_control = RateControl::Abr;
        params.video.rate_value = 0.0;
        let args = params.to_args(None);
        assert!(args.contains(&"-b:v".to_string()));
        assert!(args.contains(&"500k".to_string()));
        assert!(args.last().unwrap().ends_with("clip_converted.mp4"));

        params.video.rate_control = RateControl::Cbr;
        params.video.rate_value = 1.0;
        let args = params.to_args(Some("remote.mp4"));
        assert!(args.contains(&"-minrate".to_string()));
        assert!(args.contains(&"32000k".to_string()));
        assert_eq!(args.last().unwrap(), "remote.mp4");
    }
}
