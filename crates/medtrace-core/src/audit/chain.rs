//! Hash-chained event feed.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::{Database, DbError, DbResult, EventRow, NewEventRow};
use crate::models::{EntityKind, LedgerEvent, LoggedEvent};

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Page size used when walking the whole feed.
const VERIFY_PAGE: u32 = 500;

/// Latest position of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub seq: u64,
    pub hash: String,
}

/// Outcome of re-hashing the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Entries examined
    pub checked: u64,
    /// First entry whose link or hash does not match, if any
    pub first_broken_seq: Option<u64>,
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        self.first_broken_seq.is_none()
    }
}

/// Append-only event feed over the `events` table.
///
/// Appends happen inside the caller's transaction so an event is stored iff
/// the mutation it describes is.
pub struct EventLog<'a> {
    db: &'a Database,
}

impl<'a> EventLog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append an event, linking it to the current head.
    pub fn append(&self, event: &LedgerEvent, at: i64) -> DbResult<LoggedEvent> {
        let payload = serde_json::to_string(event)?;
        let prev_hash = self
            .db
            .last_event()?
            .map(|row| row.hash)
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let hash = chain_hash(&prev_hash, &payload);

        let seq = self.db.append_event(&NewEventRow {
            entity: event.entity_kind(),
            entity_id: event.entity_id(),
            kind: event.name(),
            payload: &payload,
            created_at: at,
            prev_hash: &prev_hash,
            hash: &hash,
        })?;
        debug!("Event {} appended at seq {}", event.name(), seq);

        Ok(LoggedEvent {
            seq,
            event: event.clone(),
            created_at: at,
            prev_hash,
            hash,
        })
    }

    pub fn head(&self) -> DbResult<Option<ChainHead>> {
        Ok(self.db.last_event()?.map(|row| ChainHead {
            seq: row.seq,
            hash: row.hash,
        }))
    }

    /// Entries after `seq`, oldest first (activity feed paging).
    pub fn events_since(&self, seq: u64, limit: u32) -> DbResult<Vec<LoggedEvent>> {
        self.db
            .list_events_after(seq, limit)?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub fn events_for_drug(&self, id: u64) -> DbResult<Vec<LoggedEvent>> {
        self.events_for(EntityKind::Drug, id)
    }

    pub fn events_for_record(&self, id: u64) -> DbResult<Vec<LoggedEvent>> {
        self.events_for(EntityKind::Record, id)
    }

    fn events_for(&self, entity: EntityKind, id: u64) -> DbResult<Vec<LoggedEvent>> {
        self.db
            .list_events_for_entity(entity, id)?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Re-hash every entry and check each link back to genesis.
    pub fn verify_chain(&self) -> DbResult<ChainVerification> {
        let mut expected_prev = GENESIS_HASH.to_string();
        let mut checked = 0u64;
        let mut after = 0u64;

        loop {
            let page = self.db.list_events_after(after, VERIFY_PAGE)?;
            if page.is_empty() {
                break;
            }
            for row in page {
                checked += 1;
                after = row.seq;

                let intact = row.prev_hash == expected_prev
                    && row.hash == chain_hash(&row.prev_hash, &row.payload)
                    && serde_json::from_str::<LedgerEvent>(&row.payload).is_ok();
                if !intact {
                    warn!("Event feed broken at seq {}", row.seq);
                    return Ok(ChainVerification {
                        checked,
                        first_broken_seq: Some(row.seq),
                    });
                }
                expected_prev = row.hash;
            }
        }

        Ok(ChainVerification {
            checked,
            first_broken_seq: None,
        })
    }
}

/// Compute SHA-256 hash of data, hex encoded.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Link hash: sha256(prev_hash || payload).
pub fn chain_hash(prev_hash: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

fn decode(row: EventRow) -> DbResult<LoggedEvent> {
    let event: LedgerEvent = serde_json::from_str(&row.payload).map_err(DbError::from)?;
    if event.name() != row.kind || event.entity_id() != row.entity_id {
        return Err(DbError::Constraint(format!(
            "event {} does not match its payload",
            row.seq
        )));
    }
    Ok(LoggedEvent {
        seq: row.seq,
        event,
        created_at: row.created_at,
        prev_hash: row.prev_hash,
        hash: row.hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn transfer(id: u64, from: &str, to: &str) -> LedgerEvent {
        LedgerEvent::DrugTransferred {
            id,
            from: from.into(),
            to: to.into(),
        }
    }

    #[test]
    fn test_first_entry_links_to_genesis() {
        let db = setup_db();
        let log = EventLog::new(&db);

        let logged = log.append(&transfer(1, "0xa", "0xb"), 100).unwrap();
        assert_eq!(logged.seq, 1);
        assert_eq!(logged.prev_hash, GENESIS_HASH);
        assert_eq!(logged.hash.len(), 64);
    }

    #[test]
    fn test_entries_link_to_previous() {
        let db = setup_db();
        let log = EventLog::new(&db);

        let first = log.append(&transfer(1, "0xa", "0xb"), 100).unwrap();
        let second = log.append(&transfer(1, "0xb", "0xc"), 101).unwrap();
        assert_eq!(second.prev_hash, first.hash);

        let head = log.head().unwrap().unwrap();
        assert_eq!(head, ChainHead { seq: 2, hash: second.hash });
    }

    #[test]
    fn test_events_since_round_trips_payload() {
        let db = setup_db();
        let log = EventLog::new(&db);
        log.append(&transfer(1, "0xa", "0xb"), 100).unwrap();
        log.append(&transfer(2, "0xa", "0xc"), 101).unwrap();

        let events = log.events_since(1, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, transfer(2, "0xa", "0xc"));
    }

    #[test]
    fn test_events_since_past_end() {
        let db = setup_db();
        let log = EventLog::new(&db);
        log.append(&transfer(1, "0xa", "0xb"), 100).unwrap();
        log.append(&transfer(2, "0xa", "0xc"), 101).unwrap();

        assert!(log.events_since(2, 10).unwrap().is_empty());
        assert!(log.events_since(u64::MAX, 10).unwrap().is_empty());
    }

    #[test]
    fn test_verify_empty_chain() {
        let db = setup_db();
        let result = EventLog::new(&db).verify_chain().unwrap();
        assert!(result.is_valid());
        assert_eq!(result.checked, 0);
    }

    #[test]
    fn test_verify_detects_tampering() {
        let db = setup_db();
        let log = EventLog::new(&db);
        for i in 0..4 {
            log.append(&transfer(1, "0xa", &format!("0x{}", i)), 100).unwrap();
        }
        assert!(log.verify_chain().unwrap().is_valid());

        db.conn()
            .execute_batch(
                r#"
                DROP TRIGGER events_no_update;
                UPDATE events
                SET payload = '{"event":"DrugTransferred","id":1,"from":"0xa","to":"0xevil"}'
                WHERE seq = 3;
                "#,
            )
            .unwrap();

        let result = log.verify_chain().unwrap();
        assert_eq!(result.first_broken_seq, Some(3));
        assert_eq!(result.checked, 3);
    }

    #[test]
    fn test_hash_deterministic() {
        let hash1 = hash_data(b"test data");
        let hash2 = hash_data(b"test data");
        assert_eq!(hash1, hash2);

        // SHA-256 produces 64 hex characters
        assert_eq!(hash1.len(), 64);
        assert_ne!(chain_hash(GENESIS_HASH, "a"), chain_hash(GENESIS_HASH, "b"));
    }
}
