//! Queue service: admission control, task lifecycle, and event fan-out.
//!
//! [`QueueService`] is the single entry point for callers (UI, upload
//! pipeline) and for runner events flowing back in. All task mutation happens
//! under one mutex, so every handler runs to completion before the next is
//! applied and no component ever holds a private copy of task state. Runner
//! shutdowns are asynchronous: the service transitions the task, awaits the
//! runner's completion on a spawned task, and only then finalizes the
//! transition and offers the freed slot to the next eligible task.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::{QueueError, Result};
use crate::events::QueueEvent;
use crate::notifications::{Notification, NotificationLevel, NotificationLog};
use crate::progress::{wall_clock, ProgressLog, StatusSample};
use crate::runner::{RunnerEvent, RunnerFactory, RunnerMode};
use crate::state::{
    OutputParams, RateControl, TaskId, TaskSnapshot, TaskStatus, TaskStore, WorkingStatus,
};

struct ServiceState {
    store: TaskStore,
    notifications: NotificationLog,
    working_status: WorkingStatus,
    /// Seeds new tasks; lives outside the store so it can never be scheduled.
    default_params: OutputParams,
    runner_version: String,
}

/// The transcoding queue.
pub struct QueueService {
    inner: Mutex<ServiceState>,
    event_tx: broadcast::Sender<QueueEvent>,
    config: Config,
    runner_factory: Arc<dyn RunnerFactory>,
}

impl QueueService {
    pub fn new(config: Config, runner_factory: Arc<dyn RunnerFactory>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);
        Arc::new(Self {
            inner: Mutex::new(ServiceState {
                store: TaskStore::new(),
                notifications: NotificationLog::new(),
                working_status: WorkingStatus::Stopped,
                default_params: OutputParams::default(),
                runner_version: String::new(),
            }),
            event_tx,
            config,
            runner_factory,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Task operations
    // ------------------------------------------------------------------

    /// Add a task. A local input is probed for metadata right away; a remote
    /// input parks in `Initializing` until its upload resolves.
    pub fn create_task(self: &Arc<Self>, name: &str, params: OutputParams) -> TaskId {
        let mut inner = self.inner.lock();
        let id = inner.store.insert(name, params);
        let input = inner.store.try_get(id).and_then(|t| t.params.input.clone());
        tracing::info!(id, name, remote = input.is_none(), "task added");
        self.emit(QueueEvent::TaskListChanged {
            ids: inner.store.ids(),
        });
        self.emit_task_locked(&inner, id);
        drop(inner);

        if let Some(path) = input {
            self.spawn_probe(id, path);
        }
        id
    }

    pub fn delete_task(&self, id: TaskId) -> Result<()> {
        let mut inner = self.inner.lock();
        self.delete_task_locked(&mut inner, id)
    }

    pub fn start_task(self: &Arc<Self>, id: TaskId) -> Result<()> {
        let mut inner = self.inner.lock();
        self.start_task_locked(&mut inner, id)
    }

    /// Pause a running task. With `reassign_rest`, the freed slot is offered
    /// to tasks queued after this one.
    pub fn pause_task(self: &Arc<Self>, id: TaskId, reassign_rest: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        self.pause_task_locked(&mut inner, id, reassign_rest)
    }

    pub fn resume_task(self: &Arc<Self>, id: TaskId) -> Result<()> {
        let mut inner = self.inner.lock();
        self.resume_task_locked(&mut inner, id)
    }

    /// Bring a task back to `Stopped`. From `Paused`/`Running` this stops the
    /// process gracefully and lands on `Stopped` asynchronously; from
    /// `Stopping` it force-kills; from `Finished`/`Error` it is a synchronous
    /// reclassification.
    pub fn reset_task(self: &Arc<Self>, id: TaskId) -> Result<()> {
        let mut inner = self.inner.lock();
        self.reset_task_locked(&mut inner, id)
    }

    /// Bulk re-parameterization. Validates every id up front; each task keeps
    /// its own input while the rest of the parameters are replaced, and the
    /// cached arguments and output name are recomputed.
    pub fn set_parameters(&self, ids: &[TaskId], params: &OutputParams) -> Result<()> {
        let mut inner = self.inner.lock();
        for &id in ids {
            inner.store.get(id)?;
        }
        for &id in ids {
            {
                let task = inner.store.get_mut(id)?;
                let mut next = params.clone();
                next.input = task.params.input.clone();
                task.params = next;
                if task.is_remote {
                    task.output_file =
                        Some(OutputParams::remote_output_name(&task.params.container));
                } else if task.output_file.is_some() {
                    task.output_file = Some(task.params.local_output_name());
                }
                task.command_args = task.params.to_args(task.output_file.as_deref());
            }
            self.emit_task_locked(&inner, id);
        }
        Ok(())
    }

    /// Called by the upload pipeline once a remote task's input is on disk.
    /// A task deleted while its upload was in flight is tolerated silently.
    pub fn merge_uploaded(self: &Arc<Self>, id: TaskId, resolved_path: PathBuf) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.store.try_get(id).is_none() {
            tracing::warn!(id, "upload completed for a task that no longer exists");
            return Ok(());
        }
        let name = {
            let task = inner.store.get_mut(id)?;
            task.ensure("merge upload", &[TaskStatus::Initializing])?;
            task.params.input = Some(resolved_path.clone());
            task.status = TaskStatus::Stopped;
            task.command_args = task.params.to_args(task.output_file.as_deref());
            task.name.clone()
        };
        tracing::info!(id, "remote input resolved");
        self.post_notification_locked(
            &mut inner,
            id,
            format!("Task \"{name}\": input upload complete"),
            NotificationLevel::Info,
        );
        self.emit_task_locked(&inner, id);
        drop(inner);

        self.spawn_probe(id, resolved_path);
        Ok(())
    }

    /// Frontend-reported ceiling breach; same induced stop as the one the
    /// periodic sample handler triggers.
    pub fn report_time_limit_exceeded(self: &Arc<Self>, id: TaskId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.store.get(id)?.ensure("stop", &[TaskStatus::Running])?;
        self.stop_over_limit_locked(&mut inner, id)
    }

    // ------------------------------------------------------------------
    // Queue operations
    // ------------------------------------------------------------------

    /// Fill free slots with the earliest eligible tasks.
    pub fn assign_queue(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        self.assign_queue_locked(&mut inner, 0);
    }

    /// Park the whole queue: every running task is paused without cascading
    /// re-assignment, and the working status is set to paused outright.
    pub fn pause_queue(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        inner.working_status = WorkingStatus::Paused;
        self.emit(QueueEvent::WorkingStatusChanged {
            value: WorkingStatus::Paused,
        });
        let running: Vec<TaskId> = inner
            .store
            .iter()
            .filter(|(_, t)| t.status == TaskStatus::Running)
            .map(|(id, _)| id)
            .collect();
        for id in running {
            if let Err(error) = self.pause_task_locked(&mut inner, id, false) {
                tracing::error!(id, %error, "failed to pause task while parking the queue");
            }
        }
    }

    // ------------------------------------------------------------------
    // Notifications / defaults / observers
    // ------------------------------------------------------------------

    pub fn delete_notification(&self, id: u32) {
        let mut inner = self.inner.lock();
        if inner.notifications.clear(id) {
            self.emit(QueueEvent::NotificationCleared { id });
        }
    }

    /// Parameter set that seeds newly created tasks.
    pub fn default_params(&self) -> OutputParams {
        self.inner.lock().default_params.clone()
    }

    pub fn set_default_params(&self, params: OutputParams) {
        self.inner.lock().default_params = params;
    }

    /// Query the runner executable's version banner; the result arrives as a
    /// `RunnerVersionReported` event.
    pub fn refresh_runner_version(self: &Arc<Self>) {
        let (handle, mut rx) = self.runner_factory.spawn(
            &self.config.runner.executable,
            RunnerMode::VersionProbe,
            &["-version".to_string()],
        );
        let service = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    RunnerEvent::Version(text) => {
                        service.inner.lock().runner_version = text.clone();
                        service.emit(QueueEvent::RunnerVersionReported { text });
                    }
                    RunnerEvent::Data(text) => tracing::debug!("{text}"),
                    _ => {}
                }
            }
            drop(handle);
        });
    }

    pub fn task(&self, id: TaskId) -> Result<TaskSnapshot> {
        self.inner.lock().store.get(id).map(|t| t.snapshot())
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.inner.lock().store.ids()
    }

    pub fn working_status(&self) -> WorkingStatus {
        self.inner.lock().working_status
    }

    pub fn running_count(&self) -> usize {
        self.inner.lock().store.running_count()
    }

    pub fn notifications(&self) -> Vec<(u32, Notification)> {
        self.inner.lock().notifications.active()
    }

    pub fn runner_version(&self) -> String {
        self.inner.lock().runner_version.clone()
    }

    // ------------------------------------------------------------------
    // Lifecycle internals (all run under the state lock)
    // ------------------------------------------------------------------

    fn start_task_locked(self: &Arc<Self>, inner: &mut ServiceState, id: TaskId) -> Result<()> {
        let now = wall_clock();
        let scheduler = &self.config.scheduler;

        let clamp = {
            let task = inner.store.get(id)?;
            task.ensure("start", &[TaskStatus::Stopped, TaskStatus::Error])?;
            let video = &task.params.video;
            let out_of_band = video.rate_value < scheduler.rate_value_min
                || video.rate_value > scheduler.rate_value_max;
            if scheduler.is_rate_limited()
                && matches!(video.rate_control, RateControl::Abr | RateControl::Cbr)
                && out_of_band
            {
                let clamped = video
                    .rate_value
                    .clamp(scheduler.rate_value_min, scheduler.rate_value_max);
                Some((task.name.clone(), clamped))
            } else {
                None
            }
        };

        tracing::info!(id, "starting task");
        self.set_console_locked(inner, id, String::new(), false);

        if let Some((name, clamped)) = clamp {
            self.post_notification_locked(
                inner,
                id,
                format!(
                    "Task \"{name}\": the configured video bitrate is outside \
                     the band allowed for your tier and has been clamped"
                ),
                NotificationLevel::Warning,
            );
            if let Some(task) = inner.store.try_get_mut(id) {
                task.params.video.rate_value = clamped;
            }
        }

        let (args, seq) = {
            let task = inner.store.get_mut(id)?;
            task.status = TaskStatus::Running;
            task.run_seq += 1;
            task.progress = ProgressLog::start(now);
            if !task.is_remote {
                task.output_file = Some(task.params.local_output_name());
            }
            task.command_args = task.params.to_args(task.output_file.as_deref());
            (task.command_args.clone(), task.run_seq)
        };

        let (handle, mut rx) = self.runner_factory.spawn(
            &self.config.runner.executable,
            RunnerMode::Transcode,
            &args,
        );
        if let Some(task) = inner.store.try_get_mut(id) {
            task.runner = Some(handle);
        }

        self.emit(QueueEvent::ProgressSample {
            id,
            time: now,
            status: None,
        });
        self.emit_task_locked(inner, id);

        let service = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                service.handle_run_event(id, seq, event);
            }
        });
        Ok(())
    }

    fn pause_task_locked(
        self: &Arc<Self>,
        inner: &mut ServiceState,
        id: TaskId,
        reassign_rest: bool,
    ) -> Result<()> {
        let now = wall_clock();
        let handle = {
            let task = inner.store.get_mut(id)?;
            task.ensure("pause", &[TaskStatus::Running])?;
            let handle = task.runner.clone().ok_or(QueueError::InvalidTransition {
                id,
                op: "pause",
                status: task.status,
            })?;
            task.status = TaskStatus::Paused;
            task.progress.on_pause(now);
            handle
        };
        handle.pause();
        tracing::info!(id, "task paused");
        self.emit_task_locked(inner, id);
        if reassign_rest {
            let from = inner.store.position_of(id).map(|p| p + 1).unwrap_or(0);
            self.assign_queue_locked(inner, from);
        }
        Ok(())
    }

    fn resume_task_locked(&self, inner: &mut ServiceState, id: TaskId) -> Result<()> {
        let now = wall_clock();
        let handle = {
            let task = inner.store.get_mut(id)?;
            task.ensure("resume", &[TaskStatus::Paused])?;
            let handle = task.runner.clone().ok_or(QueueError::InvalidTransition {
                id,
                op: "resume",
                status: task.status,
            })?;
            task.status = TaskStatus::Running;
            task.progress.on_resume(now);
            handle
        };
        handle.resume();
        tracing::info!(id, "task resumed");
        self.emit_task_locked(inner, id);
        Ok(())
    }

    fn reset_task_locked(self: &Arc<Self>, inner: &mut ServiceState, id: TaskId) -> Result<()> {
        let status = inner.store.get(id)?.status;
        match status {
            TaskStatus::Paused | TaskStatus::Running => {
                let (handle, seq) = {
                    let task = inner.store.get_mut(id)?;
                    let handle = task.runner.clone().ok_or(QueueError::InvalidTransition {
                        id,
                        op: "reset",
                        status,
                    })?;
                    task.status = TaskStatus::Stopping;
                    (handle, task.run_seq)
                };
                tracing::info!(id, "stopping task");
                let service = Arc::clone(self);
                tokio::spawn(async move {
                    handle.exit().await;
                    service.finalize_stop(id, seq, TaskStatus::Stopped, false);
                });
            }
            TaskStatus::Stopping => {
                let handle = {
                    let task = inner.store.get_mut(id)?;
                    let handle = task.runner.take();
                    task.status = TaskStatus::Stopped;
                    handle
                };
                tracing::info!(id, "force-stopping task");
                if let Some(handle) = handle {
                    let service = Arc::clone(self);
                    tokio::spawn(async move {
                        handle.force_kill().await;
                        let mut inner = service.inner.lock();
                        service.emit_task_locked(&inner, id);
                        service.queue_check_locked(&mut inner);
                    });
                }
            }
            TaskStatus::Finished | TaskStatus::Error => {
                inner.store.get_mut(id)?.status = TaskStatus::Stopped;
                tracing::info!(id, "task reset");
            }
            _ => {
                return Err(QueueError::InvalidTransition {
                    id,
                    op: "reset",
                    status,
                })
            }
        }
        self.queue_check_locked(inner);
        self.emit_task_locked(inner, id);
        Ok(())
    }

    fn delete_task_locked(&self, inner: &mut ServiceState, id: TaskId) -> Result<()> {
        {
            let task = inner.store.get(id)?;
            task.ensure(
                "delete",
                &[
                    TaskStatus::Initializing,
                    TaskStatus::Finished,
                    TaskStatus::Stopped,
                    TaskStatus::Error,
                ],
            )?;
        }
        let mut task = match inner.store.remove(id) {
            Some(task) => task,
            None => return Err(QueueError::NotFound(id)),
        };
        task.status = TaskStatus::Deleted;
        tracing::info!(id, name = %task.name, "task deleted");
        self.emit(QueueEvent::TaskUpdated {
            id,
            task: task.snapshot(),
        });
        self.emit(QueueEvent::TaskListChanged {
            ids: inner.store.ids(),
        });
        Ok(())
    }

    /// Induced graceful stop for a ceiling breach: through `Stopping`, then
    /// lands on `Error` and frees the slot.
    fn stop_over_limit_locked(self: &Arc<Self>, inner: &mut ServiceState, id: TaskId) -> Result<()> {
        let name = inner.store.get(id)?.name.clone();
        tracing::warn!(id, "task exceeded the run duration ceiling");
        self.post_notification_locked(
            inner,
            id,
            format!(
                "Task \"{name}\" reached the run duration ceiling for your \
                 tier and has been stopped"
            ),
            NotificationLevel::Error,
        );
        let (handle, seq) = {
            let task = inner.store.get_mut(id)?;
            task.ensure("stop", &[TaskStatus::Running])?;
            task.status = TaskStatus::Stopping;
            (task.runner.clone(), task.run_seq)
        };
        self.emit_task_locked(inner, id);

        let Some(handle) = handle else {
            tracing::warn!(id, "no runner attached to a running task");
            return Ok(());
        };
        let service = Arc::clone(self);
        tokio::spawn(async move {
            handle.exit().await;
            service.finalize_stop(id, seq, TaskStatus::Error, true);
        });
        Ok(())
    }

    /// Completes an asynchronous stop once the runner reports it is gone.
    /// Ignored when the run was superseded or already force-finalized.
    fn finalize_stop(self: &Arc<Self>, id: TaskId, seq: u64, final_status: TaskStatus, reassign: bool) {
        let mut inner = self.inner.lock();
        {
            let task = match inner.store.try_get_mut(id) {
                Some(task) => task,
                None => return,
            };
            if task.run_seq != seq || task.status != TaskStatus::Stopping {
                return;
            }
            task.runner = None;
            task.status = final_status;
        }
        tracing::info!(id, status = ?final_status, "task stop completed");
        self.emit_task_locked(&inner, id);
        if reassign {
            let from = inner.store.position_of(id).map(|p| p + 1).unwrap_or(0);
            self.assign_queue_locked(&mut inner, from);
        } else {
            self.queue_check_locked(&mut inner);
        }
    }

    // ------------------------------------------------------------------
    // Runner event handling
    // ------------------------------------------------------------------

    fn handle_run_event(self: &Arc<Self>, id: TaskId, seq: u64, event: RunnerEvent) {
        let mut inner = self.inner.lock();
        let current = match inner.store.try_get(id) {
            Some(task) => task.run_seq,
            None => {
                tracing::warn!(id, "runner event for a deleted task");
                return;
            }
        };
        if current != seq {
            tracing::warn!(id, "discarding runner event from a superseded run");
            return;
        }

        match event {
            RunnerEvent::Data(text) => {
                self.set_console_locked(&mut inner, id, text, true);
            }
            RunnerEvent::Status(sample) => {
                self.on_status_sample_locked(&mut inner, id, sample);
            }
            RunnerEvent::Finished => {
                self.on_finished_locked(&mut inner, id);
            }
            RunnerEvent::Warning(text) => {
                let name = inner
                    .store
                    .try_get(id)
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                self.post_notification_locked(
                    &mut inner,
                    id,
                    format!("{name}: {text}"),
                    NotificationLevel::Warning,
                );
            }
            RunnerEvent::Critical(lines) => {
                let name = inner
                    .store
                    .try_get(id)
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                let detail = lines.concat();
                self.on_run_failed_locked(
                    &mut inner,
                    id,
                    format!(
                        "Task \"{name}\" failed to transcode. {detail} Check \
                         the task's console output for details."
                    ),
                );
            }
            RunnerEvent::Escaped => {
                let name = inner
                    .store
                    .try_get(id)
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                self.on_run_failed_locked(
                    &mut inner,
                    id,
                    format!(
                        "Task \"{name}\" terminated abnormally. Check the \
                         task's console output for details."
                    ),
                );
            }
            // Not produced in transcode mode.
            RunnerEvent::Metadata(_) | RunnerEvent::Version(_) => {}
        }
    }

    fn on_status_sample_locked(self: &Arc<Self>, inner: &mut ServiceState, id: TaskId, sample: StatusSample) {
        let now = wall_clock();
        let scheduler = &self.config.scheduler;
        let (time, over_ceiling) = {
            let task = match inner.store.try_get_mut(id) {
                Some(task) => task,
                None => return,
            };
            if task.status != TaskStatus::Running {
                return;
            }
            let time = task.progress.on_sample(now, sample);
            let over = scheduler.is_rate_limited()
                && (task.progress.latest_output_time().unwrap_or(0.0)
                    > scheduler.run_ceiling_secs
                    || task.progress.total_elapsed(now, true) > scheduler.run_ceiling_secs);
            (time, over)
        };

        if over_ceiling {
            if let Err(error) = self.stop_over_limit_locked(inner, id) {
                tracing::error!(id, %error, "failed to stop task over the run ceiling");
            }
            return;
        }
        self.emit(QueueEvent::ProgressSample {
            id,
            time,
            status: Some(sample),
        });
    }

    fn on_finished_locked(self: &Arc<Self>, inner: &mut ServiceState, id: TaskId) {
        let now = wall_clock();
        let name = {
            let task = match inner.store.try_get_mut(id) {
                Some(task) => task,
                None => return,
            };
            if task.status != TaskStatus::Running {
                return;
            }
            task.progress.on_pause(now);
            task.runner = None;
            task.status = TaskStatus::Finished;
            task.name.clone()
        };
        tracing::info!(id, "task finished");
        self.post_notification_locked(
            inner,
            id,
            format!("Task \"{name}\" finished transcoding"),
            NotificationLevel::Ok,
        );
        self.emit_task_locked(inner, id);
        let from = inner.store.position_of(id).map(|p| p + 1).unwrap_or(0);
        self.assign_queue_locked(inner, from);
    }

    fn on_run_failed_locked(self: &Arc<Self>, inner: &mut ServiceState, id: TaskId, content: String) {
        {
            let task = match inner.store.try_get_mut(id) {
                Some(task) => task,
                None => return,
            };
            if task.status != TaskStatus::Running {
                return;
            }
            task.runner = None;
            task.status = TaskStatus::Error;
        }
        tracing::error!(id, "task failed");
        self.post_notification_locked(inner, id, content, NotificationLevel::Error);
        self.emit_task_locked(inner, id);
        let from = inner.store.position_of(id).map(|p| p + 1).unwrap_or(0);
        self.assign_queue_locked(inner, from);
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// One call of the admission scan. `start_from` skips that many entries
    /// (ascending id order) on every pass of this call, so a freed slot is
    /// first offered to tasks queued after the task that freed it; earlier
    /// tasks get reconsidered on the next call.
    fn assign_queue_locked(self: &Arc<Self>, inner: &mut ServiceState, start_from: usize) {
        while inner.store.running_count() < self.config.scheduler.max_concurrency {
            let mut action = None;
            for (index, (id, task)) in inner.store.iter().enumerate() {
                if index < start_from {
                    continue;
                }
                match task.status {
                    TaskStatus::Stopped => {
                        action = Some((id, false));
                        break;
                    }
                    TaskStatus::Paused => {
                        action = Some((id, true));
                        break;
                    }
                    _ => {}
                }
            }
            let Some((id, resume)) = action else { break };
            let outcome = if resume {
                self.resume_task_locked(inner, id)
            } else {
                self.start_task_locked(inner, id)
            };
            if let Err(error) = outcome {
                tracing::error!(id, %error, "scheduling action failed");
                break;
            }
        }
        self.queue_check_locked(inner);
    }

    /// Re-derive the queue-wide working status; emits only on change.
    fn queue_check_locked(&self, inner: &mut ServiceState) {
        let new_status = if inner.store.queue_count() == 0 {
            WorkingStatus::Stopped
        } else if inner.store.running_count() == 0 {
            WorkingStatus::Paused
        } else {
            WorkingStatus::Running
        };
        if inner.working_status != new_status {
            inner.working_status = new_status;
            self.emit(QueueEvent::WorkingStatusChanged { value: new_status });
        }
    }

    // ------------------------------------------------------------------
    // Metadata probing
    // ------------------------------------------------------------------

    fn spawn_probe(self: &Arc<Self>, id: TaskId, input: PathBuf) {
        let args = vec![
            "-hide_banner".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-f".to_string(),
            "null".to_string(),
        ];
        let (handle, mut rx) = self.runner_factory.spawn(
            &self.config.runner.executable,
            RunnerMode::MediaProbe,
            &args,
        );
        let service = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                service.handle_probe_event(id, &input, event);
            }
            drop(handle);
        });
    }

    fn handle_probe_event(&self, id: TaskId, input: &Path, event: RunnerEvent) {
        let mut inner = self.inner.lock();
        match event {
            RunnerEvent::Data(text) => {
                if inner.store.try_get(id).is_some() {
                    self.set_console_locked(&mut inner, id, text, true);
                }
            }
            RunnerEvent::Metadata(info) => {
                let updated = match inner.store.try_get_mut(id) {
                    Some(task) => {
                        task.input_info = info;
                        true
                    }
                    None => false,
                };
                if updated {
                    self.emit_task_locked(&inner, id);
                }
            }
            // A probe failure means the input is unusable: tell the user and
            // drop the task.
            RunnerEvent::Critical(lines) => {
                let reason = lines.concat();
                tracing::warn!(id, input = %input.display(), "input probe failed");
                self.post_notification_locked(
                    &mut inner,
                    id,
                    format!("{}: {reason}", input.display()),
                    NotificationLevel::Warning,
                );
                if let Err(error) = self.delete_task_locked(&mut inner, id) {
                    tracing::warn!(id, %error, "could not delete task after probe failure");
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    fn set_console_locked(&self, inner: &mut ServiceState, id: TaskId, text: String, append: bool) {
        let task = match inner.store.try_get_mut(id) {
            Some(task) => task,
            None => return,
        };
        if !append {
            task.console = text.clone();
        } else if !text.is_empty() {
            if !task.console.is_empty() && !task.console.ends_with('\n') {
                task.console.push('\n');
            }
            task.console.push_str(&text);
        }
        self.emit(QueueEvent::ConsoleAppend { id, text, append });
    }

    fn post_notification_locked(
        &self,
        inner: &mut ServiceState,
        task_id: TaskId,
        content: String,
        level: NotificationLevel,
    ) {
        let (id, notification) = inner.notifications.post(task_id, content, level);
        self.emit(QueueEvent::NotificationPosted { id, notification });
    }

    fn emit_task_locked(&self, inner: &ServiceState, id: TaskId) {
        match inner.store.try_get(id) {
            Some(task) => self.emit(QueueEvent::TaskUpdated {
                id,
                task: task.snapshot(),
            }),
            None => tracing::warn!(id, "tried to publish a task that does not exist"),
        }
    }

    fn emit(&self, event: QueueEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("no subscribers for queue event");
        }
    }
}
