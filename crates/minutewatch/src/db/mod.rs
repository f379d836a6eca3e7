//! SQLite persistence.
//!
//! `Database` wraps one rusqlite connection behind a `Mutex`. Unlike a pool,
//! a broken connection is replaced wholesale with [`Database::reopen`], which
//! is what the job store does between write retries.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod config_repo;
pub mod error;
pub mod job_repo;
pub mod keyword_repo;
pub mod migrations;
pub mod result_repo;

pub use error::DatabaseError;

/// Where a [`Database`] lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

/// Thread-safe database handle. Cloning shares the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: DbLocation,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: DbLocation::File(path.to_path_buf()),
        })
    }

    /// Opens an in-memory database. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: DbLocation::Memory,
        })
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    /// Returns a handle backed by a fresh connection to the same location.
    ///
    /// An in-memory database cannot be reopened without losing its contents,
    /// so for [`DbLocation::Memory`] this returns a handle to the existing
    /// connection.
    pub fn reopen(&self) -> Result<Self, DatabaseError> {
        match &self.location {
            DbLocation::File(path) => Self::open(path),
            DbLocation::Memory => Ok(self.clone()),
        }
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}
