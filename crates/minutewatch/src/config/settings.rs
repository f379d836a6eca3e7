use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::DEFAULT_USER_AGENT;
use crate::jobs::executor::{DEFAULT_CHECKPOINT_EVERY, DEFAULT_JOB_TIMEOUT};
use crate::jobs::{ExecutorConfig, RetryPolicy};
use crate::scanner::DEFAULT_SNIPPET_CHARS;
use crate::storage::RetentionPolicy;

pub const SETTINGS_VERSION: &str = "1.0";
pub const DATABASE_FILENAME: &str = "minutewatch.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub version: String,
    /// Root of the on-disk layout. Defaults to `~/.minutewatch`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Defaults to `<data_dir>/minutewatch.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub jobs: JobSettings,
    #[serde(default)]
    pub retention: RetentionSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION.to_string(),
            data_dir: None,
            database_path: None,
            sources: Vec::new(),
            http: HttpSettings::default(),
            jobs: JobSettings::default(),
            retention: RetentionSettings::default(),
            retry: RetrySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.resolved_data_dir().join(DATABASE_FILENAME))
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            source_urls: self.sources.clone(),
            checkpoint_every: self.jobs.checkpoint_every,
            timeout: Duration::from_secs(self.jobs.timeout_seconds),
            retry: self.retry.policy(),
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            raw_days: self.retention.raw_days,
            annotated_days: self.retention.annotated_days,
            artifact_days: self.retention.artifact_days,
        }
    }
}

/// `~/.minutewatch`, or `./.minutewatch` when there is no home directory.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".minutewatch"))
        .unwrap_or_else(|| PathBuf::from(".minutewatch"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default = "default_job_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

fn default_job_timeout() -> u64 {
    DEFAULT_JOB_TIMEOUT.as_secs()
}

fn default_checkpoint_every() -> usize {
    DEFAULT_CHECKPOINT_EVERY
}

fn default_snippet_chars() -> usize {
    DEFAULT_SNIPPET_CHARS
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_job_timeout(),
            checkpoint_every: default_checkpoint_every(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionSettings {
    #[serde(default = "default_raw_days")]
    pub raw_days: u64,
    #[serde(default = "default_annotated_days")]
    pub annotated_days: u64,
    #[serde(default = "default_artifact_days")]
    pub artifact_days: u64,
}

fn default_raw_days() -> u64 {
    30
}

fn default_annotated_days() -> u64 {
    90
}

fn default_artifact_days() -> u64 {
    30
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            raw_days: default_raw_days(),
            annotated_days: default_annotated_days(),
            artifact_days: default_artifact_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
