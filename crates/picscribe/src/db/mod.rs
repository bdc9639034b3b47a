//! SQLite storage for descriptions and rename bookkeeping.
//!
//! One rusqlite connection per process, shared by every worker behind a mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod descriptions;
pub mod error;
pub mod migrations;

pub use descriptions::{DescriptionRecord, DescriptionStore};
pub use error::DatabaseError;

/// Shared handle to the description database.
///
/// Clones point at the same connection, so a pooled run still has a single
/// writer.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database file, creating it and its directory when missing,
    /// and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        // A second picscribe process waits for the lock instead of failing.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        migrations::run_all(&conn)?;

        log::info!("Description database: {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// Schema-complete database that lives only as long as the handle. Dry
    /// runs use it so no file appears on disk.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_all(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}
