//! Errors returned by ledger operations.

use thiserror::Error;

use crate::content::ContentError;
use crate::db::DbError;

/// Drug mutation by anyone other than the current owner.
pub const NOT_THE_OWNER: &str = "Not the owner";
/// Record read by someone who is not patient, creator or grantee.
pub const NO_RECORD_ACCESS: &str = "No access to this record";
/// Grant by anyone other than the patient.
pub const NOT_AUTHORIZED_TO_GRANT: &str = "Not authorized to grant access";
/// Revoke by anyone other than the patient.
pub const NOT_AUTHORIZED_TO_REVOKE: &str = "Not authorized to revoke access";
/// Attempt to revoke the patient's own access.
pub const CANNOT_REVOKE_PATIENT: &str = "Cannot revoke patient's access";
/// Listing another patient's records.
pub const NO_PATIENT_RECORDS_ACCESS: &str = "No access to these records";
/// Viewing pending requests as anyone other than the patient.
pub const NOT_AUTHORIZED_TO_VIEW_REQUESTS: &str = "Not authorized to view access requests";
/// Viewing the access list as anyone other than the patient.
pub const NOT_AUTHORIZED_TO_VIEW_ACCESS_LIST: &str = "Not authorized to view access list";

/// Ledger errors.
///
/// `Unauthorized` and `InvalidOperation` carry the exact rule message;
/// callers match on it.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub(crate) fn unauthorized(reason: &str) -> Self {
        LedgerError::Unauthorized(reason.to_string())
    }

    /// The rule message for authorization and semantic refusals.
    pub fn reason(&self) -> Option<&str> {
        match self {
            LedgerError::Unauthorized(reason) | LedgerError::InvalidOperation(reason) => {
                Some(reason)
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Database(DbError::Sqlite(e))
    }
}

impl From<ContentError> for LedgerError {
    fn from(e: ContentError) -> Self {
        LedgerError::StorageUnavailable(e.to_string())
    }
}
