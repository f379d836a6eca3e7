//! Job configuration rows. Configs are write-once.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone)]
pub struct JobConfigRow {
    pub id: String,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub max_pages: Option<i64>,
    pub include_minutes: bool,
    pub include_agendas: bool,
    pub created_at: String,
}

impl JobConfigRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            date_from: row.get("date_from")?,
            date_to: row.get("date_to")?,
            max_pages: row.get("max_pages")?,
            include_minutes: row.get("include_minutes")?,
            include_agendas: row.get("include_agendas")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(db: &Database, config: &JobConfigRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO job_configs (id, date_from, date_to, max_pages, include_minutes,
             include_agendas, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                config.id,
                config.date_from,
                config.date_to,
                config.max_pages,
                config.include_minutes,
                config.include_agendas,
                config.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobConfigRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM job_configs WHERE id = ?1",
                params![id],
                JobConfigRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}
