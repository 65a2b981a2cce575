//! Medical record and access-list database operations.

use rusqlite::{params, OptionalExtension};

use super::{to_rowid, Database, DbResult};
use crate::models::{Identity, MedicalRecord};

impl Database {
    /// Insert a record. Returns the new id.
    pub fn insert_record(
        &self,
        patient: &Identity,
        payload_ref: &str,
        created_at: i64,
        created_by: &Identity,
    ) -> DbResult<u64> {
        self.conn.execute(
            r#"
            INSERT INTO medical_records (patient, payload_ref, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![patient.as_str(), payload_ref, created_at, created_by.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid() as u64)
    }

    /// Get a record with its access list and pending requests.
    pub fn get_record(&self, id: u64) -> DbResult<Option<MedicalRecord>> {
        let Some(rowid) = to_rowid(id) else {
            return Ok(None);
        };

        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, patient, payload_ref, created_at, created_by
                FROM medical_records
                WHERE id = ?
                "#,
                [rowid],
                |row| {
                    Ok(RecordRow {
                        id: row.get::<_, i64>(0)? as u64,
                        patient: row.get(1)?,
                        payload_ref: row.get(2)?,
                        created_at: row.get(3)?,
                        created_by: row.get(4)?,
                    })
                },
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };

        let access_list = self.list_identities(
            "SELECT identity FROM record_access WHERE record_id = ? ORDER BY rowid",
            rowid,
        )?;
        let pending_requests = self.list_identities(
            "SELECT identity FROM record_access_requests WHERE record_id = ? ORDER BY rowid",
            rowid,
        )?;

        Ok(Some(MedicalRecord {
            id: row.id,
            patient: Identity::from(row.patient),
            payload_ref: row.payload_ref,
            created_at: row.created_at,
            created_by: Identity::from(row.created_by),
            access_list,
            pending_requests,
        }))
    }

    /// Whether `identity` is the patient, the creator, or granted.
    /// False for unknown records.
    pub fn record_permits(&self, id: u64, identity: &Identity) -> DbResult<bool> {
        let Some(rowid) = to_rowid(id) else {
            return Ok(false);
        };

        let permitted: bool = self.conn.query_row(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM medical_records r
                WHERE r.id = ?1
                  AND (r.patient = ?2
                       OR r.created_by = ?2
                       OR EXISTS (SELECT 1 FROM record_access a
                                  WHERE a.record_id = r.id AND a.identity = ?2))
            )
            "#,
            params![rowid, identity.as_str()],
            |row| row.get(0),
        )?;
        Ok(permitted)
    }

    /// Add a pending request. Returns false if it was already pending.
    pub fn add_access_request(&self, id: u64, requester: &Identity, at: i64) -> DbResult<bool> {
        let Some(rowid) = to_rowid(id) else {
            return Ok(false);
        };

        let rows_affected = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO record_access_requests (record_id, identity, requested_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![rowid, requester.as_str(), at],
        )?;
        Ok(rows_affected > 0)
    }

    /// Move `grantee` from pending into the access list.
    pub fn grant_record_access(&self, id: u64, grantee: &Identity, at: i64) -> DbResult<()> {
        let Some(rowid) = to_rowid(id) else {
            return Ok(());
        };

        self.conn.execute(
            "DELETE FROM record_access_requests WHERE record_id = ?1 AND identity = ?2",
            params![rowid, grantee.as_str()],
        )?;
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO record_access (record_id, identity, granted_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![rowid, grantee.as_str(), at],
        )?;
        Ok(())
    }

    /// Remove `target` from the access list. Returns false if it was not there.
    pub fn revoke_record_access(&self, id: u64, target: &Identity) -> DbResult<bool> {
        let Some(rowid) = to_rowid(id) else {
            return Ok(false);
        };

        let rows_affected = self.conn.execute(
            "DELETE FROM record_access WHERE record_id = ?1 AND identity = ?2",
            params![rowid, target.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Ids of records belonging to `patient`, in creation order.
    pub fn list_patient_record_ids(&self, patient: &Identity) -> DbResult<Vec<u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM medical_records WHERE patient = ? ORDER BY id")?;
        let ids = stmt
            .query_map([patient.as_str()], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(|id| id as u64).collect())
    }

    /// Whether `identity` can read at least one of `patient`'s records.
    pub fn can_read_any_patient_record(
        &self,
        patient: &Identity,
        identity: &Identity,
    ) -> DbResult<bool> {
        let found: bool = self.conn.query_row(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM medical_records r
                WHERE r.patient = ?1
                  AND (r.created_by = ?2
                       OR EXISTS (SELECT 1 FROM record_access a
                                  WHERE a.record_id = r.id AND a.identity = ?2))
            )
            "#,
            params![patient.as_str(), identity.as_str()],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// Number of records `identity` can read under any role.
    pub fn count_accessible_records(&self, identity: &Identity) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM medical_records r
            WHERE r.patient = ?1
               OR r.created_by = ?1
               OR EXISTS (SELECT 1 FROM record_access a
                          WHERE a.record_id = r.id AND a.identity = ?1)
            "#,
            [identity.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Number of open requests across all of `patient`'s records.
    pub fn count_pending_requests_for_patient(&self, patient: &Identity) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM record_access_requests q
            JOIN medical_records r ON r.id = q.record_id
            WHERE r.patient = ?
            "#,
            [patient.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_identities(&self, sql: &str, rowid: i64) -> DbResult<Vec<Identity>> {
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map([rowid], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values.into_iter().map(Identity::from).collect())
    }
}

/// Intermediate row struct for database mapping.
struct RecordRow {
    id: u64,
    patient: String,
    payload_ref: String,
    created_at: i64,
    created_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> (Database, u64) {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_record(&"0xpatient".into(), "QmTestHash", 1_700_000_000, &"0xdoctor".into())
            .unwrap();
        (db, id)
    }

    #[test]
    fn test_insert_and_get() {
        let (db, id) = setup_db();
        assert_eq!(id, 1);

        let record = db.get_record(id).unwrap().unwrap();
        assert_eq!(record.patient, Identity::from("0xpatient"));
        assert_eq!(record.payload_ref, "QmTestHash");
        assert_eq!(record.created_by, Identity::from("0xdoctor"));
        assert!(record.access_list.is_empty());
        assert!(record.pending_requests.is_empty());
    }

    #[test]
    fn test_request_is_idempotent() {
        let (db, id) = setup_db();
        assert!(db.add_access_request(id, &"0xnurse".into(), 1).unwrap());
        assert!(!db.add_access_request(id, &"0xnurse".into(), 2).unwrap());

        let record = db.get_record(id).unwrap().unwrap();
        assert_eq!(record.pending_requests, vec![Identity::from("0xnurse")]);
    }

    #[test]
    fn test_grant_moves_from_pending() {
        let (db, id) = setup_db();
        db.add_access_request(id, &"0xnurse".into(), 1).unwrap();
        db.grant_record_access(id, &"0xnurse".into(), 2).unwrap();

        let record = db.get_record(id).unwrap().unwrap();
        assert_eq!(record.access_list, vec![Identity::from("0xnurse")]);
        assert!(record.pending_requests.is_empty());
        assert!(db.record_permits(id, &"0xnurse".into()).unwrap());
    }

    #[test]
    fn test_revoke() {
        let (db, id) = setup_db();
        db.grant_record_access(id, &"0xnurse".into(), 2).unwrap();

        assert!(db.revoke_record_access(id, &"0xnurse".into()).unwrap());
        assert!(!db.revoke_record_access(id, &"0xnurse".into()).unwrap());
        assert!(!db.record_permits(id, &"0xnurse".into()).unwrap());
    }

    #[test]
    fn test_permits_implicit_roles() {
        let (db, id) = setup_db();
        assert!(db.record_permits(id, &"0xpatient".into()).unwrap());
        assert!(db.record_permits(id, &"0xdoctor".into()).unwrap());
        assert!(!db.record_permits(id, &"0xother".into()).unwrap());
        assert!(!db.record_permits(99, &"0xpatient".into()).unwrap());
    }

    #[test]
    fn test_counts() {
        let (db, id) = setup_db();
        db.insert_record(&"0xpatient".into(), "QmSecond", 1, &"0xpatient".into())
            .unwrap();
        db.insert_record(&"0xsomeone".into(), "QmThird", 1, &"0xdoctor".into())
            .unwrap();
        db.add_access_request(id, &"0xnurse".into(), 1).unwrap();

        assert_eq!(db.list_patient_record_ids(&"0xpatient".into()).unwrap(), vec![1, 2]);
        assert_eq!(db.count_accessible_records(&"0xdoctor".into()).unwrap(), 2);
        assert_eq!(db.count_pending_requests_for_patient(&"0xpatient".into()).unwrap(), 1);
        assert!(db
            .can_read_any_patient_record(&"0xpatient".into(), &"0xdoctor".into())
            .unwrap());
        assert!(!db
            .can_read_any_patient_record(&"0xpatient".into(), &"0xnurse".into())
            .unwrap());
    }
}
