//! SQLite schema definition.

/// Complete database schema for medtrace.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Drugs
-- ============================================================================

-- AUTOINCREMENT so ids start at 1 and are never reused
CREATE TABLE IF NOT EXISTS drugs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    manufacturer TEXT NOT NULL,
    batch_number TEXT NOT NULL,
    manufacturing_date INTEGER NOT NULL,        -- Unix seconds
    expiry_date INTEGER NOT NULL,               -- Unix seconds
    location TEXT NOT NULL,
    owner TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Manufactured'
);

CREATE INDEX IF NOT EXISTS idx_drugs_owner ON drugs(owner);

-- Ownership history (append-only)
CREATE TABLE IF NOT EXISTS drug_history (
    drug_id INTEGER NOT NULL REFERENCES drugs(id),
    position INTEGER NOT NULL,                  -- 0 = creator
    holder TEXT NOT NULL,
    PRIMARY KEY (drug_id, position)
);

CREATE TRIGGER IF NOT EXISTS drug_history_no_update BEFORE UPDATE ON drug_history
BEGIN
    SELECT RAISE(ABORT, 'Drug history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS drug_history_no_delete BEFORE DELETE ON drug_history
BEGIN
    SELECT RAISE(ABORT, 'Drug history is append-only');
END;

-- ============================================================================
-- Medical Records
-- ============================================================================

CREATE TABLE IF NOT EXISTS medical_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient TEXT NOT NULL,
    payload_ref TEXT NOT NULL,
    created_at INTEGER NOT NULL,                -- Unix seconds
    created_by TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_patient ON medical_records(patient);

-- Record body and metadata never change after creation
CREATE TRIGGER IF NOT EXISTS medical_records_immutable BEFORE UPDATE ON medical_records
BEGIN
    SELECT RAISE(ABORT, 'Medical records are immutable');
END;

-- Granted identities (patient and creator are implicit, never stored)
CREATE TABLE IF NOT EXISTS record_access (
    record_id INTEGER NOT NULL REFERENCES medical_records(id),
    identity TEXT NOT NULL,
    granted_at INTEGER NOT NULL,
    PRIMARY KEY (record_id, identity)
);

CREATE INDEX IF NOT EXISTS idx_record_access_identity ON record_access(identity);

-- Open access requests
CREATE TABLE IF NOT EXISTS record_access_requests (
    record_id INTEGER NOT NULL REFERENCES medical_records(id),
    identity TEXT NOT NULL,
    requested_at INTEGER NOT NULL,
    PRIMARY KEY (record_id, identity)
);

-- ============================================================================
-- Event Feed (Append-Only, hash-chained)
-- ============================================================================

CREATE TABLE IF NOT EXISTS events (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    entity TEXT NOT NULL CHECK (entity IN ('drug', 'record')),
    entity_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,                      -- JSON LedgerEvent
    created_at INTEGER NOT NULL,
    prev_hash TEXT NOT NULL,
    hash TEXT NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity, entity_id);

CREATE TRIGGER IF NOT EXISTS events_no_update BEFORE UPDATE ON events
BEGIN
    SELECT RAISE(ABORT, 'Event feed is append-only');
END;

CREATE TRIGGER IF NOT EXISTS events_no_delete BEFORE DELETE ON events
BEGIN
    SELECT RAISE(ABORT, 'Event feed is append-only');
END;
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_ids_start_at_one() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO medical_records (patient, payload_ref, created_at, created_by) VALUES ('p', 'Qm', 0, 'c')",
            [],
        )
        .unwrap();
        assert_eq!(conn.last_insert_rowid(), 1);
    }

    #[test]
    fn test_history_append_only() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            r#"INSERT INTO drugs (name, manufacturer, batch_number, manufacturing_date, expiry_date, location, owner)
               VALUES ('d', 'm', 'b', 0, 0, 'l', 'o')"#,
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO drug_history (drug_id, position, holder) VALUES (1, 0, 'o')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE drug_history SET holder = 'x'", []);
        assert!(result.is_err());

        let result = conn.execute("DELETE FROM drug_history", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_records_immutable() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO medical_records (patient, payload_ref, created_at, created_by) VALUES ('p', 'Qm', 0, 'c')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE medical_records SET payload_ref = 'other'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_event_entity_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            r#"INSERT INTO events (entity, entity_id, kind, payload, created_at, prev_hash, hash)
               VALUES ('batch', 1, 'X', '{}', 0, '00', 'aa')"#,
            [],
        );
        assert!(result.is_err());
    }
}
