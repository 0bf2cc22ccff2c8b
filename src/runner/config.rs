//! Runner configuration, persisted as pretty JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::sequence::ParserOptions;
use crate::sequence::storage::write_atomic;

/// How a time scan schedules its repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeScanPolicy {
    /// Each period lasts at least the offset gap, longer if the body takes longer.
    #[default]
    Elastic,
    /// Every repetition starts at its exact offset; overlapping bodies queue on a gate.
    Forced,
}

/// Per-channel tolerances used when waiting for set-points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Kelvin.
    pub temperature: f64,
    /// Tesla.
    pub field: f64,
    /// Position units.
    pub position: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            field: 0.1,
            position: 1.0,
        }
    }
}

/// Configuration for a sequence runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Waiting tolerances, shared with chained runners
    pub thresholds: Thresholds,

    /// Seconds between polls while waiting for a set-point
    pub poll_interval_secs: f64,

    /// Seconds between polls while paused
    pub pause_poll_secs: f64,

    /// Granularity of the extra delay after a wait, in seconds
    pub wait_step_secs: f64,

    /// Points in a no-overshoot approach ramp
    pub approach_steps: usize,

    /// Settling delay after each approach step, in seconds
    pub approach_settle_secs: f64,

    /// Time scan scheduling
    pub time_scan: TimeScanPolicy,

    /// Indentation unit used when parsing chained sequences
    pub nesting_unit: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            poll_interval_secs: 0.1,
            pause_poll_secs: 0.05,
            wait_step_secs: 0.01,
            approach_steps: 10,
            approach_settle_secs: 10.0,
            time_scan: TimeScanPolicy::Elastic,
            nesting_unit: "   ".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_secs)
    }

    /// Pause poll interval as a duration.
    pub fn pause_poll(&self) -> Duration {
        secs(self.pause_poll_secs)
    }

    /// Wait-delay step as a duration.
    pub fn wait_step(&self) -> Duration {
        secs(self.wait_step_secs)
    }

    /// Parser options for chained sequences.
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            nesting_unit: self.nesting_unit.clone(),
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Write runner configuration
pub fn write_config(config: &RunnerConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(config).context("Failed to serialize config")?;
    write_atomic(path, &json)?;
    Ok(())
}

/// Load runner configuration
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    let data = fs::read(path).with_context(|| format!("Failed to read config: {:?}", path))?;
    let config: RunnerConfig =
        serde_json::from_slice(&data).context("Failed to deserialize config")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_roundtrips_through_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("runner.json");

        let config = RunnerConfig {
            approach_steps: 4,
            time_scan: TimeScanPolicy::Forced,
            ..RunnerConfig::default()
        };
        write_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: RunnerConfig =
            serde_json::from_str(r#"{"thresholds": {"temperature": 0.5, "field": 0.2, "position": 2.0}}"#)
                .unwrap();
        assert_eq!(config.thresholds.temperature, 0.5);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.time_scan, TimeScanPolicy::Elastic);
    }

    #[test]
    fn negative_durations_clamp_to_zero() {
        let config = RunnerConfig {
            wait_step_secs: -1.0,
            ..RunnerConfig::default()
        };
        assert_eq!(config.wait_step(), Duration::ZERO);
    }
}
