//! Typed records exchanged with the job store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a scrape job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// States from which a job may move into `self`.
    pub fn predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Running => &[JobStatus::Pending],
            JobStatus::Completed => &[JobStatus::Running],
            JobStatus::Failed | JobStatus::Cancelled => &[JobStatus::Pending, JobStatus::Running],
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub client_id: String,
    pub config_id: String,
    pub status: JobStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Job {
    /// Wall time between start and completion, when both are known.
    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub client_id: String,
    pub config_id: String,
    pub created_by: String,
}

/// Inclusive year-month window, compared lexicographically on `YYYY-MM`.
/// Either bound may be open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DateRange {
    pub fn new(from: Option<String>, to: Option<String>) -> Self {
        Self { from, to }
    }

    pub fn is_bounded(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn contains(&self, year_month: &str) -> bool {
        let after_start = self
            .from
            .as_deref()
            .map_or(true, |from| year_month >= from);
        let before_end = self.to.as_deref().map_or(true, |to| year_month <= to);
        after_start && before_end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    pub id: String,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub max_pages: Option<u32>,
    pub include_minutes: bool,
    pub include_agendas: bool,
    pub created_at: DateTime<Utc>,
}

impl JobConfig {
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.date_from.clone(), self.date_to.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewJobConfig {
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default = "default_true")]
    pub include_minutes: bool,
    #[serde(default)]
    pub include_agendas: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NewJobConfig {
    fn default() -> Self {
        Self {
            date_from: None,
            date_to: None,
            max_pages: None,
            include_minutes: true,
            include_agendas: false,
        }
    }
}

impl NewJobConfig {
    /// Checks the invariants the store enforces before persisting.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("date_from", &self.date_from), ("date_to", &self.date_to)] {
            if let Some(value) = value {
                if !is_year_month(value) {
                    return Err(format!("{} must be YYYY-MM, got '{}'", name, value));
                }
            }
        }
        if let (Some(from), Some(to)) = (&self.date_from, &self.date_to) {
            if from > to {
                return Err(format!("date_from {} is after date_to {}", from, to));
            }
        }
        if self.max_pages == Some(0) {
            return Err("max_pages must be at least 1".to_string());
        }
        if !self.include_minutes && !self.include_agendas {
            return Err("at least one document category must be included".to_string());
        }
        Ok(())
    }
}

/// Returns true for strings shaped `YYYY-MM` with a month in 01..=12.
pub fn is_year_month(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
        return false;
    }
    matches!(s[5..].parse::<u8>(), Ok(1..=12))
}

/// An active keyword of a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub id: i64,
    pub job_id: String,
    pub pdf_filename: String,
    /// 1-indexed.
    pub page_number: u32,
    pub keyword_id: i64,
    pub keyword: String,
    pub snippet: String,
    pub entities: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMatchResult {
    pub job_id: String,
    pub pdf_filename: String,
    pub page_number: u32,
    pub keyword_id: i64,
    pub snippet: String,
    pub entities: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordCount {
    pub keyword: String,
    pub match_count: u64,
}

#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub client_id: Option<String>,
    pub created_by: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PageRequest {
    /// `None` means no limit.
    pub limit: Option<u64>,
    pub offset: u64,
}

impl PageRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    pub offset: u64,
}
