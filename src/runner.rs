//! Contract for the external transcoder process collaborator.
//!
//! The queue core never talks to an OS process directly. It asks a
//! [`RunnerFactory`] to spawn a runner and gets back a control handle plus a
//! stream of [`RunnerEvent`]s. Argument construction and output parsing live
//! behind this boundary; the core only consumes the structured events.
//!
//! Stop and kill are asynchronous completions rather than callbacks so the
//! caller can compose "stop, then transition, then reassign" sequentially.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::progress::StatusSample;
use crate::state::InputInfo;

/// What the spawned process is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerMode {
    /// A real transcode run.
    Transcode,
    /// Query the executable's version banner.
    VersionProbe,
    /// Read input metadata without producing output.
    MediaProbe,
}

/// Events a runner delivers while alive.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// Raw output text, appended to the owning task's console buffer.
    Data(String),
    /// Input metadata resolved during a probe.
    Metadata(InputInfo),
    /// Version banner (empty string when the executable reported none).
    Version(String),
    /// Periodic progress measurement during a transcode.
    Status(StatusSample),
    /// The process completed naturally.
    Finished,
    /// Non-fatal condition; the run continues.
    Warning(String),
    /// Unrecoverable failure, with the error lines the process produced.
    Critical(Vec<String>),
    /// The process vanished without reporting completion or failure.
    Escaped,
}

/// Control surface of one live runner.
///
/// `exit` resolves once the process has actually stopped; `force_kill`
/// resolves once the kill was delivered and must not wait for a pending
/// graceful exit.
#[async_trait]
pub trait RunnerHandle: Send + Sync {
    /// Suspend the process.
    fn pause(&self);

    /// Resume a suspended process.
    fn resume(&self);

    /// Ask the process to stop gracefully and wait until it has.
    async fn exit(&self);

    /// Kill the process immediately.
    async fn force_kill(&self);
}

/// Spawns runner processes. Implementations wrap the actual transcoder
/// executable; tests substitute a scripted mock.
pub trait RunnerFactory: Send + Sync {
    fn spawn(
        &self,
        executable: &Path,
        mode: RunnerMode,
        args: &[String],
    ) -> (Arc<dyn RunnerHandle>, mpsc::UnboundedReceiver<RunnerEvent>);
}
