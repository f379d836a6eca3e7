//! Keyword lookups.
//!
//! Keyword management belongs to the admin layer; the engine only reads the
//! active keywords of a client. `insert` and `set_active` exist for seeding.

use rusqlite::params;

use super::{Database, DatabaseError};

#[derive(Debug, Clone)]
pub struct KeywordRow {
    pub id: i64,
    pub client_id: String,
    pub keyword: String,
    pub is_active: bool,
}

pub fn insert(
    db: &Database,
    client_id: &str,
    keyword: &str,
    is_active: bool,
    created_at: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO keywords (client_id, keyword, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![client_id, keyword, is_active, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn set_active(db: &Database, id: i64, is_active: bool) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE keywords SET is_active = ?2 WHERE id = ?1",
            params![id, is_active],
        )?;
        Ok(())
    })
}

/// Active keywords of a client, oldest first.
pub fn active_for_client(db: &Database, client_id: &str) -> Result<Vec<KeywordRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, client_id, keyword, is_active FROM keywords
             WHERE client_id = ?1 AND is_active = 1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![client_id], |row| {
                Ok(KeywordRow {
                    id: row.get(0)?,
                    client_id: row.get(1)?,
                    keyword: row.get(2)?,
                    is_active: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_keywords_of_client_are_returned() {
        let db = Database::open_in_memory().unwrap();
        let now = "2026-01-01T00:00:00Z";
        let zoning = insert(&db, "c1", "zoning", true, now).unwrap();
        let budget = insert(&db, "c1", "budget", true, now).unwrap();
        insert(&db, "c2", "parks", true, now).unwrap();
        set_active(&db, budget, false).unwrap();

        let rows = active_for_client(&db, "c1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, zoning);
        assert_eq!(rows[0].keyword, "zoning");
    }
}
