use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Admission-control and tier-policy knobs. Explicit configuration rather
/// than module-level constants, so tests and deployments can vary them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Maximum number of concurrently running tasks.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Feature tier. Below 50 the rate-clamp and run-ceiling policy applies.
    #[serde(default = "default_function_level")]
    pub function_level: u8,

    /// Lower bound of the allowed ABR/CBR rate-value band in the limited tier.
    #[serde(default = "default_rate_value_min")]
    pub rate_value_min: f64,

    /// Upper bound of the allowed ABR/CBR rate-value band in the limited tier.
    #[serde(default = "default_rate_value_max")]
    pub rate_value_max: f64,

    /// Limited-tier ceiling, in seconds, on both accumulated output duration
    /// and active wall-clock time of one run.
    #[serde(default = "default_run_ceiling_secs")]
    pub run_ceiling_secs: f64,
}

impl SchedulerConfig {
    /// Whether the rate-limited policy tier applies.
    pub fn is_rate_limited(&self) -> bool {
        self.function_level < 50
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            function_level: default_function_level(),
            rate_value_min: default_rate_value_min(),
            rate_value_max: default_rate_value_max(),
            run_ceiling_secs: default_run_ceiling_secs(),
        }
    }
}

fn default_max_concurrency() -> usize {
    2
}

fn default_function_level() -> u8 {
    20
}

fn default_rate_value_min() -> f64 {
    0.25
}

fn default_rate_value_max() -> f64 {
    0.75
}

fn default_run_ceiling_secs() -> f64 {
    671.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Transcoder executable handed to the runner factory.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
        }
    }
}

fn default_executable() -> PathBuf {
    PathBuf::from("ffmpeg")
}
