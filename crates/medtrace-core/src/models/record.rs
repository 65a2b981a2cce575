//! Medical record models.

use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// A medical record. The body lives in the content store; only its
/// reference is kept here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecord {
    /// Sequential ID, starting at 1
    pub id: u64,
    /// The identity the record belongs to
    pub patient: Identity,
    /// Content-store reference to the record body
    pub payload_ref: String,
    /// Unix seconds
    pub created_at: i64,
    /// The identity that created the record (often a clinician)
    pub created_by: Identity,
    /// Identities granted access beyond the patient and creator
    pub access_list: Vec<Identity>,
    /// Identities waiting on the patient's decision
    pub pending_requests: Vec<Identity>,
}

impl MedicalRecord {
    /// Patient and creator can always read; everyone else needs a grant.
    pub fn permits(&self, identity: &Identity) -> bool {
        &self.patient == identity
            || &self.created_by == identity
            || self.access_list.contains(identity)
    }

    pub fn is_pending(&self, identity: &Identity) -> bool {
        self.pending_requests.contains(identity)
    }
}

/// Who may list a patient's record ids.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatientRecordsPolicy {
    /// Only the patient
    #[default]
    PatientOnly,
    /// The patient, or anyone who can read at least one of the patient's records
    AnyGrantee,
}

/// Counts shown on the dashboard for one identity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordStats {
    /// Records where the identity is the patient
    pub total: u64,
    /// Records the identity can read
    pub accessible: u64,
    /// Open access requests on the identity's own records
    pub pending: u64,
}
