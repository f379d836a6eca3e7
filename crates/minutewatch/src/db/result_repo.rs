//! Match result rows. Rows are append-only and listed in insertion order.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A stored match joined with its keyword text.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub id: i64,
    pub job_id: String,
    pub pdf_filename: String,
    pub page_number: i64,
    pub keyword_id: i64,
    pub keyword: String,
    pub snippet: String,
    pub entities: String,
    pub created_at: String,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            pdf_filename: row.get("pdf_filename")?,
            page_number: row.get("page_number")?,
            keyword_id: row.get("keyword_id")?,
            keyword: row.get("keyword")?,
            snippet: row.get("snippet")?,
            entities: row.get("entities")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewResultRow<'a> {
    pub job_id: &'a str,
    pub pdf_filename: &'a str,
    pub page_number: i64,
    pub keyword_id: i64,
    pub snippet: &'a str,
    pub entities: &'a str,
    pub created_at: &'a str,
}

const SELECT_JOINED: &str = "SELECT r.id, r.job_id, r.pdf_filename, r.page_number, r.keyword_id,
     COALESCE(k.keyword, '') AS keyword, r.snippet, r.entities, r.created_at
     FROM match_results r LEFT JOIN keywords k ON k.id = r.keyword_id";

/// Inserts one result and returns the stored row.
pub fn insert(db: &Database, row: &NewResultRow<'_>) -> Result<ResultRow, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO match_results (job_id, pdf_filename, page_number, keyword_id, snippet,
             entities, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.job_id,
                row.pdf_filename,
                row.page_number,
                row.keyword_id,
                row.snippet,
                row.entities,
                row.created_at,
            ],
        )?;
        let id = conn.last_insert_rowid();
        let stored = conn.query_row(
            &format!("{} WHERE r.id = ?1", SELECT_JOINED),
            params![id],
            ResultRow::from_row,
        )?;
        Ok(stored)
    })
}

/// Lists results for a job, returning (rows, total_count).
/// `limit = None` returns every row.
pub fn list_for_job(
    db: &Database,
    job_id: &str,
    limit: Option<u64>,
    offset: u64,
) -> Result<(Vec<ResultRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let total: u64 = conn.query_row(
            "SELECT COUNT(*) FROM match_results WHERE job_id = ?1",
            params![job_id],
            |r| r.get(0),
        )?;

        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(&format!(
            "{} WHERE r.job_id = ?1 ORDER BY r.id LIMIT ?2 OFFSET ?3",
            SELECT_JOINED
        ))?;
        let rows = stmt
            .query_map(params![job_id, limit, offset as i64], ResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Match counts per keyword text, highest first.
pub fn keyword_counts(db: &Database, job_id: &str) -> Result<Vec<(String, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT COALESCE(k.keyword, '') AS keyword, COUNT(*) AS match_count
             FROM match_results r LEFT JOIN keywords k ON k.id = r.keyword_id
             WHERE r.job_id = ?1
             GROUP BY COALESCE(k.keyword, '')
             ORDER BY match_count DESC, keyword ASC",
        )?;
        let rows = stmt
            .query_map(params![job_id], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::config_repo::{self, JobConfigRow};
    use crate::db::job_repo::{self, JobRow};
    use crate::db::keyword_repo;

    const NOW: &str = "2026-01-01T00:00:00Z";

    fn seeded() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        config_repo::insert(
            &db,
            &JobConfigRow {
                id: "cfg".to_string(),
                date_from: None,
                date_to: None,
                max_pages: None,
                include_minutes: true,
                include_agendas: true,
                created_at: NOW.to_string(),
            },
        )
        .unwrap();
        job_repo::insert(
            &db,
            &JobRow {
                id: "job".to_string(),
                client_id: "c1".to_string(),
                config_id: "cfg".to_string(),
                status: "running".to_string(),
                created_by: "admin".to_string(),
                created_at: NOW.to_string(),
                started_at: Some(NOW.to_string()),
                completed_at: None,
                error_message: None,
            },
        )
        .unwrap();
        let zoning = keyword_repo::insert(&db, "c1", "zoning", true, NOW).unwrap();
        let budget = keyword_repo::insert(&db, "c1", "budget", true, NOW).unwrap();
        (db, zoning, budget)
    }

    fn add(db: &Database, file: &str, page: i64, keyword_id: i64) -> ResultRow {
        insert(
            db,
            &NewResultRow {
                job_id: "job",
                pdf_filename: file,
                page_number: page,
                keyword_id,
                snippet: "snippet text",
                entities: "",
                created_at: NOW,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_insert_returns_joined_keyword() {
        let (db, zoning, _) = seeded();
        let row = add(&db, "a.pdf", 3, zoning);
        assert_eq!(row.keyword, "zoning");
        assert_eq!(row.page_number, 3);
    }

    #[test]
    fn test_list_preserves_insertion_order_and_paginates() {
        let (db, zoning, budget) = seeded();
        add(&db, "b.pdf", 1, zoning);
        add(&db, "a.pdf", 2, budget);
        add(&db, "a.pdf", 2, budget);

        let (all, total) = list_for_job(&db, "job", None, 0).unwrap();
        assert_eq!(total, 3);
        assert_eq!(all[0].pdf_filename, "b.pdf");
        assert_eq!(all[1].pdf_filename, "a.pdf");

        let (page, total) = list_for_job(&db, "job", Some(1), 1).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].keyword, "budget");
    }

    #[test]
    fn test_keyword_counts_descending() {
        let (db, zoning, budget) = seeded();
        add(&db, "a.pdf", 1, zoning);
        add(&db, "a.pdf", 2, budget);
        add(&db, "b.pdf", 2, budget);

        let counts = keyword_counts(&db, "job").unwrap();
        assert_eq!(
            counts,
            vec![("budget".to_string(), 2), ("zoning".to_string(), 1)]
        );
    }
}
