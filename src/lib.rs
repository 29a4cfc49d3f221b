//! ffqueue - Bounded-concurrency transcoding queue built around an external
//! runner process.
//!
//! The crate's entry point is [`QueueService`]: callers create tasks, drive
//! their lifecycle (start, pause, resume, reset, delete), and subscribe to a
//! broadcast stream of [`events::QueueEvent`] for everything that changes.
//! Process management is abstracted behind [`runner::RunnerFactory`], so the
//! core schedules and accounts for runs without owning any OS process.

pub mod config;
pub mod error;
pub mod events;
pub mod notifications;
pub mod progress;
pub mod runner;
pub mod scheduler;
pub mod state;

pub use error::{QueueError, Result};
pub use scheduler::QueueService;
