//! Medtrace Core Library
//!
//! Drug traceability ledger and patient-controlled medical record access,
//! backed by SQLite with a hash-chained event feed.
//!
//! # Architecture
//!
//! ```text
//!   DrugLedger                      RecordAccessStore
//!   create / transfer / status      create / request / grant / revoke
//!        │                                   │
//!        └──────────────┬────────────────────┘
//!                       │  one transaction per mutation
//!                       ▼
//!        ┌──────────────────────────────┐
//!        │ SQLite: drugs, drug_history, │
//!        │ medical_records, access      │
//!        │ events (hash-chained)        │
//!        └──────────────┬───────────────┘
//!                       │
//!          ┌────────────┼─────────────┐
//!          ▼            ▼             ▼
//!     Activity feed  Provenance   Chain verify
//!                     export
//! ```
//!
//! Record bodies live in a [`content::ContentStore`] (IPFS in production);
//! the ledger keeps only their reference.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (Drug, MedicalRecord, LedgerEvent, etc.)
//! - [`ledger`]: Drug ownership ledger
//! - [`access`]: Medical record access control
//! - [`audit`]: Hash-chained event feed
//! - [`content`]: Content-addressed blob storage
//! - [`export`]: Provenance export
//! - [`config`]: File and environment configuration

pub mod access;
pub mod audit;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod export;
pub mod ledger;
pub mod models;

// Re-export commonly used types
pub use access::RecordAccessStore;
pub use audit::{ChainHead, ChainVerification, EventLog};
pub use config::{ConfigError, ContentStoreConfig, MedtraceConfig};
pub use content::{ContentError, ContentId, ContentStore, MemoryContentStore};
pub use db::Database;
pub use error::{LedgerError, LedgerResult};
pub use export::ProvenanceExporter;
pub use ledger::DrugLedger;
pub use models::{
    Drug, DrugStats, Identity, LedgerEvent, LoggedEvent, MedicalRecord, NewDrug,
    PatientRecordsPolicy, RecordStats,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MedtraceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<LedgerError> for MedtraceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(msg) => MedtraceError::NotFound(msg),
            LedgerError::Unauthorized(msg) => MedtraceError::Unauthorized(msg),
            LedgerError::InvalidOperation(msg) => MedtraceError::InvalidOperation(msg),
            LedgerError::StorageUnavailable(msg) => MedtraceError::StorageUnavailable(msg),
            LedgerError::Database(e) => MedtraceError::DatabaseError(e.to_string()),
            LedgerError::Json(e) => MedtraceError::SerializationError(e.to_string()),
        }
    }
}

impl From<db::DbError> for MedtraceError {
    fn from(e: db::DbError) -> Self {
        MedtraceError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for MedtraceError {
    fn from(e: serde_json::Error) -> Self {
        MedtraceError::SerializationError(e.to_string())
    }
}

impl From<ContentError> for MedtraceError {
    fn from(e: ContentError) -> Self {
        MedtraceError::StorageUnavailable(e.to_string())
    }
}

impl From<ConfigError> for MedtraceError {
    fn from(e: ConfigError) -> Self {
        MedtraceError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for MedtraceError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        MedtraceError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<MedtraceCore>, MedtraceError> {
    let db = Database::open(&path)?;
    Ok(MedtraceCore::wrap(db, PatientRecordsPolicy::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<MedtraceCore>, MedtraceError> {
    let db = Database::open_in_memory()?;
    Ok(MedtraceCore::wrap(db, PatientRecordsPolicy::default()))
}

/// Open the database described by a JSON config file, with `MEDTRACE_*`
/// environment overrides applied.
///
/// Record bodies go to an in-process store; `medtrace_ipfs::open_with_ipfs`
/// reads the same file and uploads bodies to the configured IPFS node.
#[uniffi::export]
pub fn open_with_config(config_path: String) -> Result<Arc<MedtraceCore>, MedtraceError> {
    let mut config = MedtraceConfig::load_from_file(&config_path)?;
    config.apply_env()?;
    let db = config.open_database()?;
    Ok(MedtraceCore::wrap(db, config.patient_records_policy))
}

/// Shorten an identity for display (`0x1234...abcd`).
#[uniffi::export]
pub fn format_identity(identity: String) -> String {
    Identity::new(identity).short()
}

/// Render Unix seconds as `YYYY-MM-DD` (UTC).
#[uniffi::export]
pub fn format_timestamp(secs: i64) -> String {
    models::format_timestamp(secs)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
///
/// Every call holds the lock for its whole duration, so mutations are
/// serialized.
#[derive(uniffi::Object)]
pub struct MedtraceCore {
    db: Arc<Mutex<Database>>,
    policy: PatientRecordsPolicy,
    content: Arc<dyn ContentStore + Send + Sync>,
}

impl MedtraceCore {
    /// Wrap an open database, storing record bodies in `content`.
    pub fn with_content_store(
        db: Database,
        policy: PatientRecordsPolicy,
        content: Arc<dyn ContentStore + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            policy,
            content,
        })
    }

    fn wrap(db: Database, policy: PatientRecordsPolicy) -> Arc<Self> {
        Self::with_content_store(db, policy, Arc::new(MemoryContentStore::new()))
    }
}

#[uniffi::export]
impl MedtraceCore {
    // =========================================================================
    // Drug Operations
    // =========================================================================

    /// Create a drug owned by `caller`.
    pub fn create_drug(&self, drug: FfiNewDrug, caller: String) -> Result<FfiDrug, MedtraceError> {
        let db = self.db.lock()?;
        let created = DrugLedger::new(&db).create_drug(&drug.into(), &Identity::new(caller))?;
        Ok(created.into())
    }

    pub fn get_drug_details(&self, id: u64) -> Result<FfiDrug, MedtraceError> {
        let db = self.db.lock()?;
        Ok(DrugLedger::new(&db).get_drug_details(id)?.into())
    }

    pub fn transfer_drug(&self, id: u64, to: String, caller: String) -> Result<FfiEvent, MedtraceError> {
        let db = self.db.lock()?;
        let event =
            DrugLedger::new(&db).transfer_drug(id, &Identity::new(to), &Identity::new(caller))?;
        FfiEvent::try_from(event)
    }

    pub fn update_drug_status(
        &self,
        id: u64,
        new_status: String,
        caller: String,
    ) -> Result<FfiEvent, MedtraceError> {
        let db = self.db.lock()?;
        let event =
            DrugLedger::new(&db).update_drug_status(id, &new_status, &Identity::new(caller))?;
        FfiEvent::try_from(event)
    }

    /// Holders in order, creator first.
    pub fn get_drug_history(&self, id: u64) -> Result<Vec<String>, MedtraceError> {
        let db = self.db.lock()?;
        let history = DrugLedger::new(&db).get_drug_history(id)?;
        Ok(history.into_iter().map(Identity::into_inner).collect())
    }

    pub fn drug_count(&self) -> Result<u64, MedtraceError> {
        let db = self.db.lock()?;
        Ok(DrugLedger::new(&db).drug_count()?)
    }

    pub fn list_drugs(&self) -> Result<Vec<FfiDrug>, MedtraceError> {
        let db = self.db.lock()?;
        let drugs = DrugLedger::new(&db).list_drugs()?;
        Ok(drugs.into_iter().map(|d| d.into()).collect())
    }

    pub fn drugs_owned_by(&self, owner: String) -> Result<Vec<FfiDrug>, MedtraceError> {
        let db = self.db.lock()?;
        let drugs = DrugLedger::new(&db).drugs_owned_by(&Identity::new(owner))?;
        Ok(drugs.into_iter().map(|d| d.into()).collect())
    }

    /// Dashboard counts as of now.
    pub fn drug_stats(&self) -> Result<FfiDrugStats, MedtraceError> {
        let db = self.db.lock()?;
        Ok(DrugLedger::new(&db).stats(models::now_unix())?.into())
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    pub fn create_record(
        &self,
        patient: String,
        payload_ref: String,
        caller: String,
    ) -> Result<FfiRecord, MedtraceError> {
        let db = self.db.lock()?;
        let record = self.records(&db).create_record(
            &Identity::new(patient),
            &payload_ref,
            &Identity::new(caller),
        )?;
        Ok(record.into())
    }

    pub fn get_record_details(&self, id: u64, caller: String) -> Result<FfiRecord, MedtraceError> {
        let db = self.db.lock()?;
        let record = self.records(&db).get_record_details(id, &Identity::new(caller))?;
        Ok(record.into())
    }

    pub fn request_access(&self, id: u64, caller: String) -> Result<FfiEvent, MedtraceError> {
        let db = self.db.lock()?;
        let event = self.records(&db).request_access(id, &Identity::new(caller))?;
        FfiEvent::try_from(event)
    }

    pub fn grant_access(
        &self,
        id: u64,
        granter: String,
        grantee: String,
    ) -> Result<FfiEvent, MedtraceError> {
        let db = self.db.lock()?;
        let event = self.records(&db).grant_access(
            id,
            &Identity::new(granter),
            &Identity::new(grantee),
        )?;
        FfiEvent::try_from(event)
    }

    pub fn revoke_access(
        &self,
        id: u64,
        revoker: String,
        target: String,
    ) -> Result<FfiEvent, MedtraceError> {
        let db = self.db.lock()?;
        let event = self.records(&db).revoke_access(
            id,
            &Identity::new(revoker),
            &Identity::new(target),
        )?;
        FfiEvent::try_from(event)
    }

    pub fn has_access(&self, id: u64, identity: String) -> Result<bool, MedtraceError> {
        let db = self.db.lock()?;
        Ok(self.records(&db).has_access(id, &Identity::new(identity))?)
    }

    pub fn get_patient_records(&self, patient: String, caller: String) -> Result<Vec<u64>, MedtraceError> {
        let db = self.db.lock()?;
        Ok(self
            .records(&db)
            .get_patient_records(&Identity::new(patient), &Identity::new(caller))?)
    }

    pub fn pending_requests(&self, id: u64, caller: String) -> Result<Vec<String>, MedtraceError> {
        let db = self.db.lock()?;
        let pending = self.records(&db).pending_requests(id, &Identity::new(caller))?;
        Ok(pending.into_iter().map(Identity::into_inner).collect())
    }

    pub fn access_list(&self, id: u64, caller: String) -> Result<Vec<String>, MedtraceError> {
        let db = self.db.lock()?;
        let granted = self.records(&db).access_list(id, &Identity::new(caller))?;
        Ok(granted.into_iter().map(Identity::into_inner).collect())
    }

    pub fn record_stats(&self, identity: String) -> Result<FfiRecordStats, MedtraceError> {
        let db = self.db.lock()?;
        Ok(self.records(&db).stats(&Identity::new(identity))?.into())
    }

    /// Upload a JSON body to the content store and create a record for it.
    pub fn create_record_with_payload(
        &self,
        patient: String,
        payload_json: String,
        caller: String,
    ) -> Result<FfiRecord, MedtraceError> {
        let payload: serde_json::Value = serde_json::from_str(&payload_json)?;
        let db = self.db.lock()?;
        let record = self.records(&db).create_record_with_payload(
            self.content.as_ref(),
            &Identity::new(patient),
            &payload,
            &Identity::new(caller),
        )?;
        Ok(record.into())
    }

    /// Fetch a record body as JSON, subject to the read check.
    pub fn fetch_record_payload(&self, id: u64, caller: String) -> Result<String, MedtraceError> {
        let db = self.db.lock()?;
        let payload =
            self.records(&db)
                .fetch_record_payload(self.content.as_ref(), id, &Identity::new(caller))?;
        Ok(serde_json::to_string(&payload)?)
    }

    // =========================================================================
    // Event Feed Operations
    // =========================================================================

    /// Events after `seq`, oldest first.
    pub fn events_since(&self, seq: u64, limit: u32) -> Result<Vec<FfiLoggedEvent>, MedtraceError> {
        let db = self.db.lock()?;
        let events = EventLog::new(&db).events_since(seq, limit)?;
        events.into_iter().map(FfiLoggedEvent::try_from).collect()
    }

    pub fn events_for_drug(&self, id: u64) -> Result<Vec<FfiLoggedEvent>, MedtraceError> {
        let db = self.db.lock()?;
        let events = EventLog::new(&db).events_for_drug(id)?;
        events.into_iter().map(FfiLoggedEvent::try_from).collect()
    }

    pub fn events_for_record(&self, id: u64) -> Result<Vec<FfiLoggedEvent>, MedtraceError> {
        let db = self.db.lock()?;
        let events = EventLog::new(&db).events_for_record(id)?;
        events.into_iter().map(FfiLoggedEvent::try_from).collect()
    }

    /// Latest feed position, `None` while the feed is empty.
    pub fn event_chain_head(&self) -> Result<Option<FfiChainHead>, MedtraceError> {
        let db = self.db.lock()?;
        Ok(EventLog::new(&db).head()?.map(Into::into))
    }

    pub fn verify_event_chain(&self) -> Result<FfiChainVerification, MedtraceError> {
        let db = self.db.lock()?;
        Ok(EventLog::new(&db).verify_chain()?.into())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export one drug with its event trail as JSON.
    pub fn export_drug_provenance_json(&self, id: u64) -> Result<String, MedtraceError> {
        let db = self.db.lock()?;
        let export = ProvenanceExporter::new(&db).export_drug(id)?;
        Ok(export.to_json()?)
    }

    /// Export every drug as JSON.
    pub fn export_all_provenance_json(&self) -> Result<String, MedtraceError> {
        let db = self.db.lock()?;
        let batch = ProvenanceExporter::new(&db).export_all()?;
        Ok(batch.to_json()?)
    }
}

impl MedtraceCore {
    fn records<'a>(&self, db: &'a Database) -> RecordAccessStore<'a> {
        RecordAccessStore::with_policy(db, self.policy)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe drug creation input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewDrug {
    pub name: String,
    pub manufacturer: String,
    pub batch_number: String,
    pub manufacturing_date: i64,
    pub expiry_date: i64,
    pub location: String,
}

impl From<FfiNewDrug> for NewDrug {
    fn from(drug: FfiNewDrug) -> Self {
        NewDrug::new(
            drug.name,
            drug.manufacturer,
            drug.batch_number,
            drug.manufacturing_date,
            drug.expiry_date,
            drug.location,
        )
    }
}

/// FFI-safe drug.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrug {
    pub id: u64,
    pub name: String,
    pub manufacturer: String,
    pub batch_number: String,
    pub manufacturing_date: i64,
    pub expiry_date: i64,
    pub location: String,
    pub owner: String,
    pub status: String,
    pub history: Vec<String>,
}

impl From<Drug> for FfiDrug {
    fn from(drug: Drug) -> Self {
        Self {
            id: drug.id,
            name: drug.name,
            manufacturer: drug.manufacturer,
            batch_number: drug.batch_number,
            manufacturing_date: drug.manufacturing_date,
            expiry_date: drug.expiry_date,
            location: drug.location,
            owner: drug.owner.into_inner(),
            status: drug.status,
            history: drug.history.into_iter().map(Identity::into_inner).collect(),
        }
    }
}

/// FFI-safe medical record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecord {
    pub id: u64,
    pub patient: String,
    pub payload_ref: String,
    pub created_at: i64,
    pub created_by: String,
    pub access_list: Vec<String>,
    pub pending_requests: Vec<String>,
}

impl From<MedicalRecord> for FfiRecord {
    fn from(record: MedicalRecord) -> Self {
        Self {
            id: record.id,
            patient: record.patient.into_inner(),
            payload_ref: record.payload_ref,
            created_at: record.created_at,
            created_by: record.created_by.into_inner(),
            access_list: record.access_list.into_iter().map(Identity::into_inner).collect(),
            pending_requests: record
                .pending_requests
                .into_iter()
                .map(Identity::into_inner)
                .collect(),
        }
    }
}

/// FFI-safe event: name, subject id and the full JSON body.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEvent {
    pub name: String,
    pub entity_id: u64,
    pub payload_json: String,
}

impl TryFrom<LedgerEvent> for FfiEvent {
    type Error = MedtraceError;

    fn try_from(event: LedgerEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            name: event.name().to_string(),
            entity_id: event.entity_id(),
            payload_json: serde_json::to_string(&event)?,
        })
    }
}

/// FFI-safe feed entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLoggedEvent {
    pub seq: u64,
    pub event: FfiEvent,
    pub created_at: i64,
    pub prev_hash: String,
    pub hash: String,
}

impl TryFrom<LoggedEvent> for FfiLoggedEvent {
    type Error = MedtraceError;

    fn try_from(logged: LoggedEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            seq: logged.seq,
            event: FfiEvent::try_from(logged.event)?,
            created_at: logged.created_at,
            prev_hash: logged.prev_hash,
            hash: logged.hash,
        })
    }
}

/// FFI-safe feed head.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChainHead {
    pub seq: u64,
    pub hash: String,
}

impl From<ChainHead> for FfiChainHead {
    fn from(head: ChainHead) -> Self {
        Self {
            seq: head.seq,
            hash: head.hash,
        }
    }
}

/// FFI-safe chain verification result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChainVerification {
    pub checked: u64,
    pub first_broken_seq: Option<u64>,
    pub is_valid: bool,
}

impl From<ChainVerification> for FfiChainVerification {
    fn from(v: ChainVerification) -> Self {
        Self {
            is_valid: v.is_valid(),
            checked: v.checked,
            first_broken_seq: v.first_broken_seq,
        }
    }
}

/// FFI-safe drug dashboard counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrugStats {
    pub total: u64,
    pub active: u64,
    pub transferred: u64,
}

impl From<DrugStats> for FfiDrugStats {
    fn from(stats: DrugStats) -> Self {
        Self {
            total: stats.total,
            active: stats.active,
            transferred: stats.transferred,
        }
    }
}

/// FFI-safe record dashboard counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecordStats {
    pub total: u64,
    pub accessible: u64,
    pub pending: u64,
}

impl From<RecordStats> for FfiRecordStats {
    fn from(stats: RecordStats) -> Self {
        Self {
            total: stats.total,
            accessible: stats.accessible,
            pending: stats.pending,
        }
    }
}
