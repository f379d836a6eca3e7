//! Job store: persistence for jobs, configs, and match results.
//!
//! The engine talks to persistence only through [`JobStore`], so the executor
//! can be exercised against a failing or in-memory store.

use thiserror::Error;

use crate::db::DatabaseError;

pub mod model;
pub mod sqlite;

pub use model::{
    DateRange, Job, JobConfig, JobFilter, JobStatus, Keyword, KeywordCount, MatchResult, NewJob,
    NewJobConfig, NewMatchResult, Page, PageRequest,
};
pub use sqlite::SqliteJobStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// True for errors a reconnect may cure.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Database(_))
    }
}

/// Persistence interface consumed by the job engine.
///
/// Status updates stamp `started_at` on the move to running and
/// `completed_at` on any terminal transition; callers never pass timestamps.
pub trait JobStore: Send + Sync {
    fn create_config(&self, config: &NewJobConfig) -> Result<JobConfig, StoreError>;

    fn create_job(&self, job: &NewJob) -> Result<Job, StoreError>;

    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;

    fn get_config(&self, id: &str) -> Result<Option<JobConfig>, StoreError>;

    /// Moves a job to `status`. Fails with [`StoreError::InvalidTransition`]
    /// when the job's current status does not allow it.
    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<Job, StoreError>;

    fn save_result(&self, result: &NewMatchResult) -> Result<MatchResult, StoreError>;

    fn list_results(&self, job_id: &str, page: PageRequest)
        -> Result<Page<MatchResult>, StoreError>;

    fn keyword_counts(&self, job_id: &str) -> Result<Vec<KeywordCount>, StoreError>;

    fn list_jobs(&self, filter: &JobFilter) -> Result<Page<Job>, StoreError>;

    fn active_keywords(&self, client_id: &str) -> Result<Vec<Keyword>, StoreError>;

    /// Replaces the underlying connection with a fresh one.
    fn reconnect(&self) -> Result<(), StoreError>;
}
