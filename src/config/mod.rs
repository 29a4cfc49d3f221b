mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./ffqueue.toml",
        "~/.config/ffqueue/config.toml",
        "/etc/ffqueue/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.scheduler.max_concurrency == 0 {
        anyhow::bail!("scheduler.max_concurrency cannot be 0");
    }

    if config.scheduler.rate_value_min >= config.scheduler.rate_value_max {
        anyhow::bail!(
            "scheduler.rate_value_min ({}) must be below rate_value_max ({})",
            config.scheduler.rate_value_min,
            config.scheduler.rate_value_max
        );
    }

    if config.scheduler.run_ceiling_secs <= 0.0 {
        anyhow::bail!("scheduler.run_ceiling_secs must be positive");
    }

    if config.runner.executable.as_os_str().is_empty() {
        anyhow::bail!("runner.executable cannot be empty");
    }

    Ok(())
}
