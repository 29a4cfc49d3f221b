//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wires a [`QueueService`] to a scripted
//! [`MockRunnerFactory`], so tests drive runner behavior by pushing events
//! into the recorded spawn channels instead of launching real processes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use ffqueue::config::Config;
use ffqueue::events::QueueEvent;
use ffqueue::progress::StatusSample;
use ffqueue::runner::{RunnerEvent, RunnerFactory, RunnerHandle, RunnerMode};
use ffqueue::state::OutputParams;
use ffqueue::QueueService;

static TRACING: Once = Once::new();

/// Install an env-filtered subscriber once per test binary, so `RUST_LOG`
/// controls queue logging during test runs.
fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Scripted runner handle. Records every control call; `exit` completes
/// immediately unless the test holds it open with [`MockHandle::hold_exit`].
#[derive(Default)]
pub struct MockHandle {
    pub pause_calls: AtomicUsize,
    pub resume_calls: AtomicUsize,
    pub exit_calls: AtomicUsize,
    pub force_kill_calls: AtomicUsize,
    exit_held: AtomicBool,
}

impl MockHandle {
    /// Make the next `exit` call park until [`release_exit`](Self::release_exit).
    pub fn hold_exit(&self) {
        self.exit_held.store(true, Ordering::SeqCst);
    }

    pub fn release_exit(&self) {
        self.exit_held.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl RunnerHandle for MockHandle {
    fn pause(&self) {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn exit(&self) {
        self.exit_calls.fetch_add(1, Ordering::SeqCst);
        while self.exit_held.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    async fn force_kill(&self) {
        self.force_kill_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// One recorded `spawn` call, with the sender side of its event channel.
#[derive(Clone)]
pub struct SpawnRecord {
    pub mode: RunnerMode,
    pub args: Vec<String>,
    pub handle: Arc<MockHandle>,
    events: mpsc::UnboundedSender<RunnerEvent>,
}

impl SpawnRecord {
    pub fn send(&self, event: RunnerEvent) {
        let _ = self.events.send(event);
    }

    pub fn finish(&self) {
        self.send(RunnerEvent::Finished);
    }

    /// A plausible progress measurement at `time` seconds of output media.
    pub fn status(&self, time: f64) {
        self.send(RunnerEvent::Status(StatusSample {
            frame: time * 25.0,
            size: time * 100.0,
            time,
        }));
    }
}

#[derive(Default)]
pub struct MockRunnerFactory {
    spawns: Mutex<Vec<SpawnRecord>>,
}

impl MockRunnerFactory {
    pub fn spawn_count(&self) -> usize {
        self.spawns.lock().len()
    }

    pub fn last_spawn(&self) -> SpawnRecord {
        self.spawns.lock().last().cloned().expect("nothing spawned")
    }

    /// Spawns of a given mode, in spawn order.
    pub fn spawns_of(&self, mode: RunnerMode) -> Vec<SpawnRecord> {
        self.spawns
            .lock()
            .iter()
            .filter(|s| s.mode == mode)
            .cloned()
            .collect()
    }

    pub fn transcodes(&self) -> Vec<SpawnRecord> {
        self.spawns_of(RunnerMode::Transcode)
    }

    pub fn probes(&self) -> Vec<SpawnRecord> {
        self.spawns_of(RunnerMode::MediaProbe)
    }
}

impl RunnerFactory for MockRunnerFactory {
    fn spawn(
        &self,
        _executable: &Path,
        mode: RunnerMode,
        args: &[String],
    ) -> (Arc<dyn RunnerHandle>, mpsc::UnboundedReceiver<RunnerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Arc::new(MockHandle::default());
        self.spawns.lock().push(SpawnRecord {
            mode,
            args: args.to_vec(),
            handle: handle.clone(),
            events: tx,
        });
        (handle, rx)
    }
}

pub struct TestHarness {
    pub service: Arc<QueueService>,
    pub factory: Arc<MockRunnerFactory>,
    pub events: broadcast::Receiver<QueueEvent>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let factory = Arc::new(MockRunnerFactory::default());
        let service = QueueService::new(config, factory.clone());
        let events = service.subscribe();
        Self {
            service,
            factory,
            events,
        }
    }

    /// Let spawned event pumps and stop completions run.
    pub async fn settle(&self) {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    pub fn drain_events(&mut self) -> Vec<QueueEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

pub fn local_params(path: &str) -> OutputParams {
    OutputParams {
        input: Some(PathBuf::from(path)),
        ..OutputParams::default()
    }
}

pub fn remote_params() -> OutputParams {
    OutputParams::default()
}
