//! Job repository — rows of the `jobs` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub client_id: String,
    pub config_id: String,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            client_id: row.get("client_id")?,
            config_id: row.get("config_id")?,
            status: row.get("status")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            error_message: row.get("error_message")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobRowFilter {
    pub status: Option<String>,
    pub client_id: Option<String>,
    pub created_by: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Column changes applied by a status transition.
#[derive(Debug, Clone)]
pub struct StatusChange<'a> {
    pub status: &'a str,
    pub started_at: Option<&'a str>,
    pub completed_at: Option<&'a str>,
    pub error_message: Option<&'a str>,
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, client_id, config_id, status, created_by, created_at,
             started_at, completed_at, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.client_id,
                job.config_id,
                job.status,
                job.created_by,
                job.created_at,
                job.started_at,
                job.completed_at,
                job.error_message,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Applies `change` only when the job's current status is one of
/// `expected_from`. Returns whether a row was updated.
///
/// `started_at` and `completed_at` are only written when provided, so a
/// timestamp, once stamped, is never cleared by a later transition.
pub fn transition(
    db: &Database,
    id: &str,
    expected_from: &[&str],
    change: &StatusChange<'_>,
) -> Result<bool, DatabaseError> {
    if expected_from.is_empty() {
        return Ok(false);
    }

    db.with_conn(|conn| {
        let placeholders: Vec<String> = (0..expected_from.len())
            .map(|i| format!("?{}", i + 6))
            .collect();
        let sql = format!(
            "UPDATE jobs SET status = ?2,
             started_at = COALESCE(?3, started_at),
             completed_at = COALESCE(?4, completed_at),
             error_message = COALESCE(?5, error_message)
             WHERE id = ?1 AND status IN ({})",
            placeholders.join(", ")
        );

        let mut values: Vec<&dyn rusqlite::types::ToSql> = vec![
            &id,
            &change.status,
            &change.started_at,
            &change.completed_at,
            &change.error_message,
        ];
        for status in expected_from {
            values.push(status);
        }

        let updated = conn.execute(&sql, values.as_slice())?;
        Ok(updated > 0)
    })
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobRowFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if let Some(ref client_id) = filter.client_id {
            conditions.push(format!("client_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(client_id.clone()));
        }
        if let Some(ref created_by) = filter.created_by {
            conditions.push(format!("created_by = ?{}", param_values.len() + 1));
            param_values.push(Box::new(created_by.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC, id LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}
