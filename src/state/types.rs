use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{QueueError, Result};
use crate::progress::ProgressLog;
use crate::runner::RunnerHandle;

pub type TaskId = u32;

/// Lifecycle state of a task. The only authoritative lifecycle field; every
/// transition is guarded and a failed guard is an error, never a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created from a remote input, waiting for the upload to complete.
    Initializing,
    /// Idle, eligible for admission.
    Stopped,
    Running,
    Paused,
    /// Graceful stop requested, process still winding down.
    Stopping,
    /// Reserved terminal-approach state; counted with the active set.
    Finishing,
    Finished,
    Error,
    /// Terminal; the record is removed from the store right after.
    Deleted,
}

impl TaskStatus {
    /// States counted as queue work (running, parked, or winding down).
    pub fn in_queue(self) -> bool {
        use TaskStatus::*;
        matches!(self, Running | Paused | Stopping | Finishing)
    }

    /// States a task may be deleted from.
    pub fn deletable(self) -> bool {
        use TaskStatus::*;
        matches!(self, Initializing | Finished | Stopped | Error)
    }

    /// States in which a runner handle must be attached.
    pub fn holds_runner(self) -> bool {
        use TaskStatus::*;
        matches!(self, Running | Stopping)
    }
}

/// Queue-wide derived summary. Never set directly by callers; recomputed from
/// the multiset of task statuses after scheduling settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingStatus {
    Stopped,
    Paused,
    Running,
}

/// Input media summary, populated asynchronously by the metadata probe.
/// Every field stays `None` until (unless) the probe reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputInfo {
    pub format: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub video_codec: Option<String>,
    pub resolution: Option<String>,
    /// Video bitrate in kbps.
    pub video_bitrate: Option<u64>,
    pub framerate: Option<f64>,
    pub audio_codec: Option<String>,
    /// Audio bitrate in kbps.
    pub audio_bitrate: Option<u64>,
}

/// Video rate-control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateControl {
    Crf,
    Abr,
    Cbr,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    pub rate_control: RateControl,
    /// Normalized quality/bitrate position in `[0, 1]`.
    pub rate_value: f64,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            rate_control: RateControl::Crf,
            rate_value: 0.5,
        }
    }
}

/// User-chosen transcode configuration. The core treats most of this as
/// opaque: it only reads the input path, the output container, and the video
/// rate-control values the tier policy clamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputParams {
    /// Local input path. `None` for a remote input until the upload resolves.
    pub input: Option<PathBuf>,
    /// Output container extension, e.g. `"mp4"`.
    pub container: String,
    pub video: VideoParams,
    /// Pass-through arguments, inserted before the output path.
    pub extra_args: Vec<String>,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            input: None,
            container: "mp4".to_string(),
            video: VideoParams::default(),
            extra_args: Vec::new(),
        }
    }
}

impl OutputParams {
    /// Derive the cached command-line argument list. Full parameter
    /// translation belongs to the parameter layer; this covers exactly what
    /// the queue caches and hands to the runner.
    pub fn to_args(&self, output_override: Option<&str>) -> Vec<String> {
        let mut args = vec!["-hide_banner".to_string(), "-y".to_string()];
        if let Some(input) = &self.input {
            args.push("-i".to_string());
            args.push(input.display().to_string());
        }
        match self.video.rate_control {
            RateControl::Crf => {
                args.push("-crf".to_string());
                args.push(crf_of(self.video.rate_value).to_string());
            }
            RateControl::Abr => {
                args.push("-b:v".to_string());
                args.push(format!("{}k", bitrate_kbps(self.video.rate_value)));
            }
            RateControl::Cbr => {
                let rate = format!("{}k", bitrate_kbps(self.video.rate_value));
                args.push("-b:v".to_string());
                args.push(rate.clone());
                args.push("-minrate".to_string());
                args.push(rate.clone());
                args.push("-maxrate".to_string());
                args.push(rate);
            }
            RateControl::Off => {}
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(match output_override {
            Some(name) => name.to_string(),
            None => self.local_output_name(),
        });
        args
    }

    /// Output path next to a local input, `<stem>_converted.<container>`.
    pub fn local_output_name(&self) -> String {
        match &self.input {
            Some(path) => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "output".to_string());
                let name = format!("{stem}_converted.{}", self.container);
                match path.parent() {
                    Some(dir) if dir != Path::new("") => dir.join(name).display().to_string(),
                    _ => name,
                }
            }
            None => format!("output.{}", self.container),
        }
    }

    /// Synthesized output name for a remote input: millisecond timestamp plus
    /// a short random suffix, so concurrent uploads never collide.
    pub fn remote_output_name(container: &str) -> String {
        format!(
            "{}{}.{container}",
            Utc::now().timestamp_millis(),
            random_suffix(3)
        )
    }
}

/// CRF in the 0..=51 range; higher `rate_value` means higher quality.
fn crf_of(rate_value: f64) -> u32 {
    (51.0 * (1.0 - rate_value.clamp(0.0, 1.0))).round() as u32
}

/// Log-scale mapping of `[0, 1]` onto 500 kbps..=32 Mbps.
fn bitrate_kbps(rate_value: f64) -> u64 {
    (500.0 * 64f64.powf(rate_value.clamp(0.0, 1.0))).round() as u64
}

fn random_suffix(len: usize) -> String {
    use rand::Rng;
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// One transcode unit of work.
pub struct Task {
    pub id: TaskId,
    /// Display name; the UI shows a placeholder until metadata resolves.
    pub name: String,
    pub status: TaskStatus,
    /// True when the input arrives through the upload pipeline.
    pub is_remote: bool,
    pub input_info: InputInfo,
    pub params: OutputParams,
    /// Cached arguments for the runner; recomputed whenever `params` or the
    /// output path change.
    pub command_args: Vec<String>,
    pub output_file: Option<String>,
    /// Accumulated runner output text.
    pub console: String,
    pub progress: ProgressLog,
    /// Attached only while `status.holds_runner()`; released before any
    /// terminal or stopped transition completes.
    pub runner: Option<Arc<dyn RunnerHandle>>,
    /// Run generation, bumped on every start. Completions and runner events
    /// carry the generation they belong to, so anything from a superseded run
    /// is discarded.
    pub run_seq: u64,
}

impl Task {
    pub fn new(id: TaskId, name: &str, params: OutputParams) -> Self {
        let is_remote = params.input.is_none();
        let (status, output_file) = if is_remote {
            (
                TaskStatus::Initializing,
                Some(OutputParams::remote_output_name(&params.container)),
            )
        } else {
            (TaskStatus::Stopped, None)
        };
        let command_args = params.to_args(output_file.as_deref());
        Self {
            id,
            name: name.to_string(),
            status,
            is_remote,
            input_info: InputInfo::default(),
            params,
            command_args,
            output_file,
            console: String::new(),
            progress: ProgressLog::default(),
            runner: None,
            run_seq: 0,
        }
    }

    /// Guard a transition; the caller names the operation for the error.
    pub fn ensure(&self, op: &'static str, allowed: &[TaskStatus]) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(QueueError::InvalidTransition {
                id: self.id,
                op,
                status: self.status,
            })
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            is_remote: self.is_remote,
            input_info: self.input_info.clone(),
            params: self.params.clone(),
            command_args: self.command_args.clone(),
            output_file: self.output_file.clone(),
            console: self.console.clone(),
            progress: self.progress.clone(),
        }
    }
}

/// Observer-facing copy of a task, minus the runner handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub is_remote: bool,
    pub input_info: InputInfo,
    pub params: OutputParams,
    pub command_args: Vec<String>,
    pub output_file: Option<String>,
    pub console: String,
    pub progress: ProgressLog,
}
