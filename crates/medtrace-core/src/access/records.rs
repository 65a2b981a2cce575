//! Medical record access control.

use log::{debug, info, warn};

use crate::audit::EventLog;
use crate::db::Database;
use crate::error::{
    LedgerError, LedgerResult, CANNOT_REVOKE_PATIENT, NOT_AUTHORIZED_TO_GRANT,
    NOT_AUTHORIZED_TO_REVOKE, NOT_AUTHORIZED_TO_VIEW_ACCESS_LIST,
    NOT_AUTHORIZED_TO_VIEW_REQUESTS, NO_PATIENT_RECORDS_ACCESS, NO_RECORD_ACCESS,
};
use crate::models::{
    now_unix, Identity, LedgerEvent, MedicalRecord, PatientRecordsPolicy, RecordStats,
};

/// Medical records and who may read them.
///
/// The patient and the creator always have access. Anyone may request
/// access; only the patient grants or revokes, and the patient's own
/// access can never be revoked.
pub struct RecordAccessStore<'a> {
    pub(super) db: &'a Database,
    policy: PatientRecordsPolicy,
}

impl<'a> RecordAccessStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_policy(db, PatientRecordsPolicy::default())
    }

    pub fn with_policy(db: &'a Database, policy: PatientRecordsPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> PatientRecordsPolicy {
        self.policy
    }

    /// Create a record for `patient`, attributed to `caller`.
    pub fn create_record(
        &self,
        patient: &Identity,
        payload_ref: &str,
        caller: &Identity,
    ) -> LedgerResult<MedicalRecord> {
        let created_at = now_unix();

        let tx = self.db.begin()?;
        let id = self.db.insert_record(patient, payload_ref, created_at, caller)?;
        EventLog::new(self.db).append(
            &LedgerEvent::RecordCreated {
                id,
                patient: patient.clone(),
                payload_ref: payload_ref.to_string(),
            },
            created_at,
        )?;
        tx.commit()?;

        info!("Record {} created for {} by {}", id, patient, caller);
        Ok(MedicalRecord {
            id,
            patient: patient.clone(),
            payload_ref: payload_ref.to_string(),
            created_at,
            created_by: caller.clone(),
            access_list: Vec::new(),
            pending_requests: Vec::new(),
        })
    }

    /// Read a record as `caller`.
    pub fn get_record_details(&self, id: u64, caller: &Identity) -> LedgerResult<MedicalRecord> {
        let record = self.require_record(id)?;
        if !record.permits(caller) {
            warn!("{} denied read of record {}", caller, id);
            return Err(LedgerError::unauthorized(NO_RECORD_ACCESS));
        }
        debug!("Record {} read by {}", id, caller);
        Ok(record)
    }

    /// Ask the patient for access. Repeat requests leave state unchanged, and
    /// identities that can already read the record are never queued.
    pub fn request_access(&self, id: u64, caller: &Identity) -> LedgerResult<LedgerEvent> {
        let at = now_unix();

        let tx = self.db.begin()?;
        let record = self.require_record(id)?;
        if !record.permits(caller) && !record.is_pending(caller) {
            self.db.add_access_request(id, caller, at)?;
        }
        let event = LedgerEvent::AccessRequested {
            id,
            requester: caller.clone(),
        };
        EventLog::new(self.db).append(&event, at)?;
        tx.commit()?;

        info!("{} requested access to record {}", caller, id);
        Ok(event)
    }

    /// Patient grants `grantee` access, clearing any pending request.
    pub fn grant_access(
        &self,
        id: u64,
        granter: &Identity,
        grantee: &Identity,
    ) -> LedgerResult<LedgerEvent> {
        let at = now_unix();

        let tx = self.db.begin()?;
        let record = self.require_record(id)?;
        if &record.patient != granter {
            warn!("{} tried to grant access to record {}", granter, id);
            return Err(LedgerError::unauthorized(NOT_AUTHORIZED_TO_GRANT));
        }

        self.db.grant_record_access(id, grantee, at)?;
        let event = LedgerEvent::AccessGranted {
            id,
            requester: grantee.clone(),
        };
        EventLog::new(self.db).append(&event, at)?;
        tx.commit()?;

        info!("Record {} access granted to {}", id, grantee);
        Ok(event)
    }

    /// Patient removes `target` from the access list.
    pub fn revoke_access(
        &self,
        id: u64,
        revoker: &Identity,
        target: &Identity,
    ) -> LedgerResult<LedgerEvent> {
        let at = now_unix();

        let tx = self.db.begin()?;
        let record = self.require_record(id)?;
        if &record.patient != revoker {
            warn!("{} tried to revoke access to record {}", revoker, id);
            return Err(LedgerError::unauthorized(NOT_AUTHORIZED_TO_REVOKE));
        }
        if &record.patient == target {
            return Err(LedgerError::InvalidOperation(CANNOT_REVOKE_PATIENT.to_string()));
        }

        self.db.revoke_record_access(id, target)?;
        let event = LedgerEvent::AccessRevoked {
            id,
            user: target.clone(),
        };
        EventLog::new(self.db).append(&event, at)?;
        tx.commit()?;

        info!("Record {} access revoked from {}", id, target);
        Ok(event)
    }

    /// Whether `identity` may read the record. Unknown ids yield false.
    pub fn has_access(&self, id: u64, identity: &Identity) -> LedgerResult<bool> {
        Ok(self.db.record_permits(id, identity)?)
    }

    /// Ids of `patient`'s records in creation order.
    pub fn get_patient_records(
        &self,
        patient: &Identity,
        caller: &Identity,
    ) -> LedgerResult<Vec<u64>> {
        let allowed = caller == patient
            || match self.policy {
                PatientRecordsPolicy::PatientOnly => false,
                PatientRecordsPolicy::AnyGrantee => {
                    self.db.can_read_any_patient_record(patient, caller)?
                }
            };
        if !allowed {
            warn!("{} denied listing of {}'s records", caller, patient);
            return Err(LedgerError::unauthorized(NO_PATIENT_RECORDS_ACCESS));
        }
        Ok(self.db.list_patient_record_ids(patient)?)
    }

    /// Open requests on a record, visible to the patient only.
    pub fn pending_requests(&self, id: u64, caller: &Identity) -> LedgerResult<Vec<Identity>> {
        let record = self.require_record(id)?;
        if &record.patient != caller {
            return Err(LedgerError::unauthorized(NOT_AUTHORIZED_TO_VIEW_REQUESTS));
        }
        Ok(record.pending_requests)
    }

    /// Explicit grants on a record, visible to the patient only.
    pub fn access_list(&self, id: u64, caller: &Identity) -> LedgerResult<Vec<Identity>> {
        let record = self.require_record(id)?;
        if &record.patient != caller {
            return Err(LedgerError::unauthorized(NOT_AUTHORIZED_TO_VIEW_ACCESS_LIST));
        }
        Ok(record.access_list)
    }

    /// Dashboard counts for `identity`.
    pub fn stats(&self, identity: &Identity) -> LedgerResult<RecordStats> {
        Ok(RecordStats {
            total: self.db.list_patient_record_ids(identity)?.len() as u64,
            accessible: self.db.count_accessible_records(identity)?,
            pending: self.db.count_pending_requests_for_patient(identity)?,
        })
    }

    pub(super) fn require_record(&self, id: u64) -> LedgerResult<MedicalRecord> {
        self.db
            .get_record(id)?
            .ok_or_else(|| LedgerError::NotFound(format!("Record {} does not exist", id)))
    }
}
