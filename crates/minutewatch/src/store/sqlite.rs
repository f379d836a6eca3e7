//! SQLite-backed [`JobStore`].

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::db::config_repo::{self, JobConfigRow};
use crate::db::job_repo::{self, JobRow, JobRowFilter, StatusChange};
use crate::db::result_repo::{self, NewResultRow, ResultRow};
use crate::db::{keyword_repo, Database};

use super::model::is_year_month;
use super::{
    Job, JobConfig, JobFilter, JobStatus, JobStore, Keyword, KeywordCount, MatchResult, NewJob,
    NewJobConfig, NewMatchResult, Page, PageRequest, StoreError,
};

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_optional(s: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    s.map(parse_timestamp).transpose()
}

fn job_from_row(row: JobRow) -> Result<Job, StoreError> {
    let status = JobStatus::parse(&row.status).ok_or_else(|| {
        StoreError::Corrupt(format!("unknown status '{}' for job {}", row.status, row.id))
    })?;
    Ok(Job {
        status,
        created_at: parse_timestamp(&row.created_at)?,
        started_at: parse_optional(row.started_at.as_deref())?,
        completed_at: parse_optional(row.completed_at.as_deref())?,
        id: row.id,
        client_id: row.client_id,
        config_id: row.config_id,
        created_by: row.created_by,
        error_message: row.error_message,
    })
}

fn config_from_row(row: JobConfigRow) -> Result<JobConfig, StoreError> {
    let max_pages = row
        .max_pages
        .map(|n| {
            u32::try_from(n)
                .map_err(|_| StoreError::Corrupt(format!("bad max_pages {} in config {}", n, row.id)))
        })
        .transpose()?;
    for bound in [&row.date_from, &row.date_to].into_iter().flatten() {
        if !is_year_month(bound) {
            return Err(StoreError::Corrupt(format!(
                "bad date bound '{}' in config {}",
                bound, row.id
            )));
        }
    }
    Ok(JobConfig {
        max_pages,
        created_at: parse_timestamp(&row.created_at)?,
        id: row.id,
        date_from: row.date_from,
        date_to: row.date_to,
        include_minutes: row.include_minutes,
        include_agendas: row.include_agendas,
    })
}

fn result_from_row(row: ResultRow) -> Result<MatchResult, StoreError> {
    let page_number = u32::try_from(row.page_number)
        .map_err(|_| StoreError::Corrupt(format!("bad page number {}", row.page_number)))?;
    Ok(MatchResult {
        page_number,
        created_at: parse_timestamp(&row.created_at)?,
        id: row.id,
        job_id: row.job_id,
        pdf_filename: row.pdf_filename,
        keyword_id: row.keyword_id,
        keyword: row.keyword,
        snippet: row.snippet,
        entities: row.entities,
    })
}

/// Job store backed by rusqlite.
///
/// The handle sits behind a `RwLock` so [`JobStore::reconnect`] can swap it
/// while other callers keep using clones of the old one until they finish.
pub struct SqliteJobStore {
    db: RwLock<Database>,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: RwLock::new(db),
        }
    }

    /// Opens an in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Returns a cloned database handle. Clones are cheap (inner `Arc`).
    pub fn database(&self) -> Database {
        let guard = match self.db.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    /// Registers a keyword for a client. Keyword administration lives
    /// outside the engine; this exists to seed data.
    pub fn add_keyword(&self, client_id: &str, keyword: &str) -> Result<Keyword, StoreError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(StoreError::Invalid("keyword must not be empty".to_string()));
        }
        let id = keyword_repo::insert(
            &self.database(),
            client_id,
            keyword,
            true,
            &format_timestamp(Utc::now()),
        )?;
        Ok(Keyword {
            id,
            text: keyword.to_string(),
        })
    }

    pub fn set_keyword_active(&self, id: i64, active: bool) -> Result<(), StoreError> {
        keyword_repo::set_active(&self.database(), id, active)?;
        Ok(())
    }
}

impl JobStore for SqliteJobStore {
    fn create_config(&self, config: &NewJobConfig) -> Result<JobConfig, StoreError> {
        config.validate().map_err(StoreError::Invalid)?;

        let row = JobConfigRow {
            id: uuid::Uuid::new_v4().to_string(),
            date_from: config.date_from.clone(),
            date_to: config.date_to.clone(),
            max_pages: config.max_pages.map(i64::from),
            include_minutes: config.include_minutes,
            include_agendas: config.include_agendas,
            created_at: format_timestamp(Utc::now()),
        };
        config_repo::insert(&self.database(), &row)?;
        config_from_row(row)
    }

    fn create_job(&self, job: &NewJob) -> Result<Job, StoreError> {
        let db = self.database();
        if config_repo::find_by_id(&db, &job.config_id)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "job config",
                id: job.config_id.clone(),
            });
        }

        let row = JobRow {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: job.client_id.clone(),
            config_id: job.config_id.clone(),
            status: JobStatus::Pending.as_str().to_string(),
            created_by: job.created_by.clone(),
            created_at: format_timestamp(Utc::now()),
            started_at: None,
            completed_at: None,
            error_message: None,
        };
        job_repo::insert(&db, &row)?;
        job_from_row(row)
    }

    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        job_repo::find_by_id(&self.database(), id)?
            .map(job_from_row)
            .transpose()
    }

    fn get_config(&self, id: &str) -> Result<Option<JobConfig>, StoreError> {
        config_repo::find_by_id(&self.database(), id)?
            .map(config_from_row)
            .transpose()
    }

    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<Job, StoreError> {
        let db = self.database();
        let now = format_timestamp(Utc::now());
        let change = StatusChange {
            status: status.as_str(),
            started_at: (status == JobStatus::Running).then_some(now.as_str()),
            completed_at: status.is_terminal().then_some(now.as_str()),
            error_message,
        };
        let expected: Vec<&str> = status.predecessors().iter().map(|s| s.as_str()).collect();

        if job_repo::transition(&db, id, &expected, &change)? {
            return self.get_job(id)?.ok_or_else(|| StoreError::NotFound {
                entity: "job",
                id: id.to_string(),
            });
        }

        match self.get_job(id)? {
            Some(current) => Err(StoreError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status,
                to: status,
            }),
            None => Err(StoreError::NotFound {
                entity: "job",
                id: id.to_string(),
            }),
        }
    }

    fn save_result(&self, result: &NewMatchResult) -> Result<MatchResult, StoreError> {
        if result.page_number == 0 {
            return Err(StoreError::Invalid("page numbers are 1-indexed".to_string()));
        }
        let created_at = format_timestamp(Utc::now());
        let row = result_repo::insert(
            &self.database(),
            &NewResultRow {
                job_id: &result.job_id,
                pdf_filename: &result.pdf_filename,
                page_number: i64::from(result.page_number),
                keyword_id: result.keyword_id,
                snippet: &result.snippet,
                entities: &result.entities,
                created_at: &created_at,
            },
        )?;
        result_from_row(row)
    }

    fn list_results(
        &self,
        job_id: &str,
        page: PageRequest,
    ) -> Result<Page<MatchResult>, StoreError> {
        let (rows, total) =
            result_repo::list_for_job(&self.database(), job_id, page.limit, page.offset)?;
        let items = rows
            .into_iter()
            .map(result_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    fn keyword_counts(&self, job_id: &str) -> Result<Vec<KeywordCount>, StoreError> {
        let counts = result_repo::keyword_counts(&self.database(), job_id)?;
        Ok(counts
            .into_iter()
            .map(|(keyword, match_count)| KeywordCount {
                keyword,
                match_count,
            })
            .collect())
    }

    fn list_jobs(&self, filter: &JobFilter) -> Result<Page<Job>, StoreError> {
        let row_filter = JobRowFilter {
            status: filter.status.map(|s| s.as_str().to_string()),
            client_id: filter.client_id.clone(),
            created_by: filter.created_by.clone(),
            limit: filter.limit,
            offset: filter.offset,
        };
        let (rows, total) = job_repo::query(&self.database(), &row_filter)?;
        let items = rows
            .into_iter()
            .map(job_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total,
            limit: filter.limit,
            offset: filter.offset.unwrap_or(0),
        })
    }

    fn active_keywords(&self, client_id: &str) -> Result<Vec<Keyword>, StoreError> {
        let rows = keyword_repo::active_for_client(&self.database(), client_id)?;
        Ok(rows
            .into_iter()
            .map(|row| Keyword {
                id: row.id,
                text: row.keyword,
            })
            .collect())
    }

    fn reconnect(&self) -> Result<(), StoreError> {
        let fresh = self.database().reopen()?;
        let mut guard = match self.db.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = fresh;
        log::info!("Job store reconnected");
        Ok(())
    }
}
