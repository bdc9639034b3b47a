//! Description repository.
//!
//! Descriptions recorded by the metadata tool live in `images`. Names chosen by
//! the rename tool live in `renames`, so one tool's bookkeeping never makes the
//! other skip a file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// One stored description. At most one exists per path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionRecord {
    pub file_path: PathBuf,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DescriptionRecord {
    fn from_row(row: &Row<'_>) -> Result<RawRecord, rusqlite::Error> {
        Ok(RawRecord {
            file_path: row.get("file_path")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

struct RawRecord {
    file_path: String,
    description: String,
    created_at: String,
    updated_at: String,
}

impl RawRecord {
    fn into_record(self) -> Result<DescriptionRecord, DatabaseError> {
        let created_at = parse_timestamp(&self.file_path, &self.created_at)?;
        let updated_at = parse_timestamp(&self.file_path, &self.updated_at)?;
        Ok(DescriptionRecord {
            file_path: PathBuf::from(self.file_path),
            description: self.description,
            created_at,
            updated_at,
        })
    }
}

fn parse_timestamp(path: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') have no offset.
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
                .map(|t| t.and_utc())
        })
        .map_err(|_| DatabaseError::Timestamp {
            path: path.to_string(),
            value: value.to_string(),
        })
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Images,
    Renames,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Images => "images",
            Table::Renames => "renames",
        }
    }
}

/// Keyed store of image descriptions.
#[derive(Clone)]
pub struct DescriptionStore {
    db: Database,
}

impl DescriptionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Inserts or refreshes the description for `path`. `created_at` survives
    /// updates.
    pub fn upsert(&self, path: &Path, description: &str) -> Result<(), DatabaseError> {
        self.upsert_into(Table::Images, path, description)
    }

    pub fn get(&self, path: &Path) -> Result<Option<DescriptionRecord>, DatabaseError> {
        self.get_from(Table::Images, path)
    }

    /// Whether the metadata tool has recorded a description for `path`.
    /// Rename bookkeeping is not counted.
    pub fn has_record(&self, path: &Path) -> Result<bool, DatabaseError> {
        let key = path_key(path);
        self.db.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM images WHERE file_path = ?1)",
                params![key],
                |r| r.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Records the description a file was renamed after, keyed by its new path.
    pub fn record_rename(&self, path: &Path, description: &str) -> Result<(), DatabaseError> {
        self.upsert_into(Table::Renames, path, description)
    }

    pub fn rename_record(&self, path: &Path) -> Result<Option<DescriptionRecord>, DatabaseError> {
        self.get_from(Table::Renames, path)
    }

    pub fn rename_count(&self) -> Result<u64, DatabaseError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM renames", [], |r| r.get(0))?;
            Ok(count.max(0) as u64)
        })
    }

    fn upsert_into(&self, table: Table, path: &Path, description: &str) -> Result<(), DatabaseError> {
        let key = path_key(path);
        // Fixed precision keeps the text column sortable.
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let sql = format!(
            "INSERT INTO {} (file_path, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(file_path) DO UPDATE SET
               description = excluded.description,
               updated_at = excluded.updated_at",
            table.name()
        );
        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(&sql, params![key, description, now])?;
            tx.commit()?;
            Ok(())
        })
    }

    fn get_from(&self, table: Table, path: &Path) -> Result<Option<DescriptionRecord>, DatabaseError> {
        let key = path_key(path);
        let sql = format!(
            "SELECT file_path, description, created_at, updated_at
             FROM {} WHERE file_path = ?1",
            table.name()
        );
        let raw = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(&sql, params![key], DescriptionRecord::from_row)
                .optional()?)
        })?;
        raw.map(RawRecord::into_record).transpose()
    }

    pub fn count(&self) -> Result<u64, DatabaseError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |r| r.get(0))?;
            Ok(count.max(0) as u64)
        })
    }

    /// Most recently updated records first.
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<DescriptionRecord>, DatabaseError> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT file_path, description, created_at, updated_at
                 FROM images ORDER BY updated_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit], DescriptionRecord::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(RawRecord::into_record).collect()
    }

    /// Removes the record for `path`. Returns whether one existed.
    pub fn delete(&self, path: &Path) -> Result<bool, DatabaseError> {
        let key = path_key(path);
        self.db.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM images WHERE file_path = ?1", params![key])?;
            Ok(affected > 0)
        })
    }

    /// Writes a consistent copy of the database to `target`.
    pub fn backup_to(&self, target: &Path) -> Result<(), DatabaseError> {
        if target.exists() {
            return Err(DatabaseError::BackupExists(target.to_path_buf()));
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let target_str = path_key(target);
        self.db.with_conn(|conn| {
            conn.execute("VACUUM INTO ?1", params![target_str])?;
            Ok(())
        })?;
        log::info!("Database backed up to {}", target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DescriptionStore {
        DescriptionStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_then_get() {
        let store = store();
        let path = Path::new("/photos/a.jpg");
        store.upsert(path, "A red barn").unwrap();

        let record = store.get(path).unwrap().unwrap();
        assert_eq!(record.file_path, path);
        assert_eq!(record.description, "A red barn");
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_upsert_twice_keeps_one_record() {
        let store = store();
        let path = Path::new("/photos/a.jpg");
        store.upsert(path, "first").unwrap();
        let first = store.get(path).unwrap().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.upsert(path, "second").unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let record = store.get(path).unwrap().unwrap();
        assert_eq!(record.description, "second");
        assert_eq!(record.created_at, first.created_at);
        assert!(record.updated_at > first.updated_at);
    }

    #[test]
    fn test_rename_records_are_kept_apart() {
        let store = store();
        let path = Path::new("/photos/a-cat.jpg");
        store.record_rename(path, "A cat").unwrap();

        assert!(!store.has_record(path).unwrap());
        assert!(store.get(path).unwrap().is_none());
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.rename_count().unwrap(), 1);
        assert_eq!(store.rename_record(path).unwrap().unwrap().description, "A cat");

        store.upsert(path, "A cat on a mat").unwrap();
        assert_eq!(store.rename_record(path).unwrap().unwrap().description, "A cat");
        assert_eq!(store.get(path).unwrap().unwrap().description, "A cat on a mat");
    }

    #[test]
    fn test_get_missing() {
        assert!(store().get(Path::new("/nope.jpg")).unwrap().is_none());
    }

    #[test]
    fn test_has_record() {
        let store = store();
        let path = Path::new("/photos/b.png");
        assert!(!store.has_record(path).unwrap());
        store.upsert(path, "b").unwrap();
        assert!(store.has_record(path).unwrap());
    }

    #[test]
    fn test_list_most_recent_first_with_limit() {
        let store = store();
        for name in ["/1.jpg", "/2.jpg", "/3.jpg"] {
            store.upsert(Path::new(name), name).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let all = store.list(None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].file_path, Path::new("/3.jpg"));

        let limited = store.list(Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[1].file_path, Path::new("/2.jpg"));
    }

    #[test]
    fn test_delete() {
        let store = store();
        let path = Path::new("/x.jpg");
        store.upsert(path, "x").unwrap();
        assert!(store.delete(path).unwrap());
        assert!(!store.delete(path).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_sqlite_datetime_format_is_read() {
        let store = store();
        store
            .database()
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO images (file_path, description, created_at, updated_at)
                     VALUES ('/legacy.jpg', 'old', '2024-03-01 12:00:00', '2024-03-01 12:00:00')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        let record = store.get(Path::new("/legacy.jpg")).unwrap().unwrap();
        assert_eq!(record.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_backup_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DescriptionStore::open(&dir.path().join("live.db")).unwrap();
        store.upsert(Path::new("/a.jpg"), "a").unwrap();

        let backup = dir.path().join("backup/copy.db");
        store.backup_to(&backup).unwrap();

        let copy = DescriptionStore::open(&backup).unwrap();
        assert_eq!(copy.count().unwrap(), 1);
        assert!(matches!(
            store.backup_to(&backup),
            Err(DatabaseError::BackupExists(_))
        ));
    }

    #[test]
    fn test_concurrent_upserts_to_different_paths() {
        let store = store();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..10 {
                        let path = PathBuf::from(format!("/t{}/{}.jpg", i, j));
                        store.upsert(&path, "x").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.count().unwrap(), 40);
    }
}
