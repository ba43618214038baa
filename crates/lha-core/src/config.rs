use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::report_job::REPORT_QUEUE;
use crate::types::TaskInterval;

pub const DEFAULT_TICK_MS: u64 = 1_000; // engine wake-up period
pub const DEFAULT_FAN_OUT_CONCURRENCY: usize = 32; // URL units in flight per process
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Top-level config (lha.toml + LHA_* env overrides).
///
/// Every section is optional; an empty file yields [`LhaConfig::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LhaConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl DatabaseConfig {
    /// Create the directory holding the database file if it is missing.
    pub fn ensure_parent_dir(&self) -> crate::error::Result<()> {
        if let Some(parent) = std::path::Path::new(&self.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Which clock the calendar cadences (daily, weekend, monthly) are aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleTimezone {
    /// Host local time.
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub timezone: ScheduleTimezone,
    /// How often the engine checks whether a cadence is due.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Upper bound on concurrently running URL units across all batches.
    #[serde(default = "default_fan_out_concurrency")]
    pub fan_out_concurrency: usize,
    /// Intervals whose cadence trigger is armed. Defaults to all five.
    #[serde(default = "default_intervals")]
    pub intervals: Vec<TaskInterval>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: ScheduleTimezone::default(),
            tick_ms: default_tick_ms(),
            fan_out_concurrency: default_fan_out_concurrency(),
            intervals: default_intervals(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name recorded on every submitted job.
    #[serde(default = "default_queue_name")]
    pub name: String,
    /// Buffer size when jobs are handed to an in-process channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}
fn default_fan_out_concurrency() -> usize {
    DEFAULT_FAN_OUT_CONCURRENCY
}
fn default_intervals() -> Vec<TaskInterval> {
    TaskInterval::ALL.to_vec()
}
fn default_queue_name() -> String {
    REPORT_QUEUE.to_string()
}
fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.lha/lha.db", home)
}

impl LhaConfig {
    /// Load config from a TOML file with LHA_* env var overrides.
    ///
    /// Nested keys are separated by a double underscore, e.g.
    /// `LHA_SCHEDULER__TICK_MS=500`. A missing file is not an error.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: LhaConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("LHA_").split("__"))
            .extract()
            .map_err(|e| crate::error::LhaError::Config(e.to_string()))?;

        if config.scheduler.tick_ms == 0 {
            return Err(crate::error::LhaError::Config(
                "scheduler.tick_ms must be greater than zero".to_string(),
            ));
        }
        if config.scheduler.fan_out_concurrency == 0 {
            return Err(crate::error::LhaError::Config(
                "scheduler.fan_out_concurrency must be greater than zero".to_string(),
            ));
        }

        tracing::debug!(%path, "configuration loaded");
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.lha/lha.toml", home)
}
