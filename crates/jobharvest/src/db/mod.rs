//! Persistent job store.
//!
//! A single rusqlite connection behind a `Mutex`, shared through a cheap
//! `Clone` handle. SQLite serialises writes anyway, and every statement the
//! orchestrator issues is short, so one connection is enough.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;
pub mod stats_repo;

pub use error::DatabaseError;
pub use job_repo::{JobQuery, SortField};
pub use stats_repo::JobStats;

/// Thread-safe database handle.
///
/// Cloning is cheap (inner `Arc`). `close()` drops the connection for every
/// clone at once; later calls fail with [`DatabaseError::Unavailable`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
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
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        migrations::run_all(&conn)?;

        log::info!("Job store opened at {}", path.display());

        Ok(Self::from_connection(conn))
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_all(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(DatabaseError::Unavailable),
        }
    }

    /// Like [`Database::with_conn`] but with mutable access, for transactions.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DatabaseError>,
    {
        let mut guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        match guard.as_mut() {
            Some(conn) => f(conn),
            None => Err(DatabaseError::Unavailable),
        }
    }

    /// Closes the connection for all handles.
    pub fn close(&self) {
        let mut guard = match self.conn.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        if guard.take().is_some() {
            log::info!("Job store closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

/// Returns the default database path: `~/.jobharvest/data/jobs.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".jobharvest").join("data").join("jobs.db"))
}
