//! Database layer for medtrace.

mod schema;
mod drugs;
mod records;
mod events;

pub use schema::*;
pub use events::*;

use rusqlite::{Connection, Transaction};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction through a shared borrow.
    ///
    /// Every statement issued through `self` until the returned guard is
    /// committed belongs to the transaction; dropping the guard rolls back.
    /// Transactions must not be nested.
    pub fn begin(&self) -> DbResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}

/// Convert an external id to a SQLite rowid. Ids beyond `i64::MAX` can
/// never exist.
pub(crate) fn to_rowid(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"drugs".to_string()));
        assert!(tables.contains(&"drug_history".to_string()));
        assert!(tables.contains(&"medical_records".to_string()));
        assert!(tables.contains(&"record_access".to_string()));
        assert!(tables.contains(&"record_access_requests".to_string()));
        assert!(tables.contains(&"events".to_string()));
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        {
            let _tx = db.begin().unwrap();
            db.conn()
                .execute(
                    "INSERT INTO medical_records (patient, payload_ref, created_at, created_by) VALUES ('p', 'Qm', 0, 'c')",
                    [],
                )
                .unwrap();
        }

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM medical_records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_to_rowid() {
        assert_eq!(to_rowid(1), Some(1));
        assert_eq!(to_rowid(u64::MAX), None);
    }
}
