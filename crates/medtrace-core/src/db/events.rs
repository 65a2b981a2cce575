//! Event feed database operations.

use rusqlite::{params, OptionalExtension};

use super::{to_rowid, Database, DbResult};
use crate::models::EntityKind;

/// An event feed row exactly as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub seq: u64,
    pub entity: String,
    pub entity_id: u64,
    pub kind: String,
    pub payload: String,
    pub created_at: i64,
    pub prev_hash: String,
    pub hash: String,
}

/// Fields for a new feed entry; `seq` is assigned on insert.
#[derive(Debug, Clone)]
pub struct NewEventRow<'a> {
    pub entity: EntityKind,
    pub entity_id: u64,
    pub kind: &'a str,
    pub payload: &'a str,
    pub created_at: i64,
    pub prev_hash: &'a str,
    pub hash: &'a str,
}

const EVENT_COLUMNS: &str =
    "seq, entity, entity_id, kind, payload, created_at, prev_hash, hash";

impl Database {
    /// Append an entry. Returns the assigned sequence number.
    pub fn append_event(&self, row: &NewEventRow<'_>) -> DbResult<u64> {
        self.conn.execute(
            r#"
            INSERT INTO events (entity, entity_id, kind, payload, created_at, prev_hash, hash)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                row.entity.as_str(),
                row.entity_id as i64,
                row.kind,
                row.payload,
                row.created_at,
                row.prev_hash,
                row.hash,
            ],
        )?;
        Ok(self.conn.last_insert_rowid() as u64)
    }

    /// The most recent entry, if any.
    pub fn last_event(&self) -> DbResult<Option<EventRow>> {
        let sql = format!("SELECT {} FROM events ORDER BY seq DESC LIMIT 1", EVENT_COLUMNS);
        self.conn
            .query_row(&sql, [], read_event_row)
            .optional()
            .map_err(Into::into)
    }

    /// Entries with `seq > after`, oldest first, at most `limit`.
    pub fn list_events_after(&self, after: u64, limit: u32) -> DbResult<Vec<EventRow>> {
        let Some(after) = to_rowid(after) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {} FROM events WHERE seq > ? ORDER BY seq LIMIT ?",
            EVENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![after, limit as i64], read_event_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// All entries about one drug or record, oldest first.
    pub fn list_events_for_entity(
        &self,
        entity: EntityKind,
        entity_id: u64,
    ) -> DbResult<Vec<EventRow>> {
        let Some(entity_id) = to_rowid(entity_id) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {} FROM events WHERE entity = ? AND entity_id = ? ORDER BY seq",
            EVENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![entity.as_str(), entity_id], read_event_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Number of entries in the feed.
    pub fn count_events(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn read_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        seq: row.get::<_, i64>(0)? as u64,
        entity: row.get(1)?,
        entity_id: row.get::<_, i64>(2)? as u64,
        kind: row.get(3)?,
        payload: row.get(4)?,
        created_at: row.get(5)?,
        prev_hash: row.get(6)?,
        hash: row.get(7)?,
    })
}
