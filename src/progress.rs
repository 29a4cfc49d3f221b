//! Per-run progress accounting.
//!
//! A [`ProgressLog`] belongs to exactly one task and is replaced wholesale on
//! every start, so one log always describes one run. It records three
//! time-series (output time, frame count, output size) keyed by wall-clock
//! offset into the run, plus the elapsed-time bookkeeping that survives
//! pause/resume cycles.
//!
//! All mutators take the current wall clock as an explicit parameter so the
//! arithmetic stays pure and testable; [`wall_clock`] is the production
//! source.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, fractional.
pub fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// One periodic measurement reported by a running transcode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusSample {
    /// Frames emitted so far.
    pub frame: f64,
    /// Output size so far, in KiB.
    pub size: f64,
    /// Output media time so far, in seconds.
    pub time: f64,
}

/// Elapsed-time accounting and sample series for a single run.
///
/// Invariant: `elapsed` only advances at the moment of pausing (or when the
/// run ends), by `last_paused - last_started`. While running, the true active
/// time is `elapsed + (now - last_started)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressLog {
    /// `(run offset, output media time)` pairs, non-decreasing in offset.
    pub time: Vec<(f64, f64)>,
    /// `(run offset, frames)` pairs.
    pub frame: Vec<(f64, f64)>,
    /// `(run offset, size)` pairs.
    pub size: Vec<(f64, f64)>,
    /// Accumulated active run time across all pause/resume cycles.
    pub elapsed: f64,
    /// Wall-clock instant of the most recent start or resume.
    pub last_started: f64,
    /// Wall-clock instant of the most recent pause.
    pub last_paused: f64,
}

impl ProgressLog {
    /// Fresh log for a run starting at `now`, seeded with a zero-valued
    /// sample in each series.
    pub fn start(now: f64) -> Self {
        Self {
            time: vec![(0.0, 0.0)],
            frame: vec![(0.0, 0.0)],
            size: vec![(0.0, 0.0)],
            elapsed: 0.0,
            last_started: now,
            last_paused: now,
        }
    }

    /// Append one measurement to every series and return the run offset `t`
    /// it was recorded at. `t` never decreases within one run.
    pub fn on_sample(&mut self, now: f64, sample: StatusSample) -> f64 {
        let t = now - self.last_started + self.elapsed;
        self.time.push((t, sample.time));
        self.frame.push((t, sample.frame));
        self.size.push((t, sample.size));
        t
    }

    /// Close the current active interval. Also used when a run ends, so the
    /// final `elapsed` covers the whole run.
    pub fn on_pause(&mut self, now: f64) {
        self.last_paused = now;
        self.elapsed += self.last_paused - self.last_started;
    }

    /// Open a new active interval.
    pub fn on_resume(&mut self, now: f64) {
        self.last_started = now;
    }

    /// Total active run time as of `now`.
    pub fn total_elapsed(&self, now: f64, running: bool) -> f64 {
        if running {
            self.elapsed + (now - self.last_started)
        } else {
            self.elapsed
        }
    }

    /// Most recent output media time, if any sample arrived yet.
    pub fn latest_output_time(&self) -> Option<f64> {
        self.time.last().map(|(_, v)| *v)
    }
}
