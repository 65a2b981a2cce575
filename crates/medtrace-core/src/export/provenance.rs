//! Drug provenance export with the event trail behind it.

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use crate::audit::{ChainHead, EventLog};
use crate::db::Database;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{Drug, LoggedEvent};

/// Current export format version.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Export metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Export format version
    pub format_version: String,
    /// RFC 3339 timestamp
    pub exported_at: String,
    /// Hash algorithm of the event chain
    pub hash_algorithm: String,
    /// Exporting system identifier
    pub system_id: Option<String>,
}

/// One drug with every event that touched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugProvenanceExport {
    pub metadata: ExportMetadata,
    pub drug: Drug,
    /// Events for this drug in feed order
    pub events: Vec<LoggedEvent>,
    /// Feed head at export time
    pub chain_head: Option<ChainHead>,
    /// Whether the whole feed re-hashed cleanly
    pub chain_valid: bool,
}

impl DrugProvenanceExport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Every drug in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProvenanceExport {
    pub metadata: ExportMetadata,
    pub chain_head: Option<ChainHead>,
    pub chain_valid: bool,
    /// Total events in the feed
    pub event_count: u64,
    pub drugs: Vec<DrugProvenanceEntry>,
}

/// A drug and its events inside a batch export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugProvenanceEntry {
    pub drug: Drug,
    pub events: Vec<LoggedEvent>,
}

impl BatchProvenanceExport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Provenance exporter.
pub struct ProvenanceExporter<'a> {
    db: &'a Database,
    log: EventLog<'a>,
    system_id: Option<String>,
}

impl<'a> ProvenanceExporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            log: EventLog::new(db),
            system_id: None,
        }
    }

    /// Set the system identifier for exports.
    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    /// Export one drug.
    pub fn export_drug(&self, id: u64) -> LedgerResult<DrugProvenanceExport> {
        let drug = self
            .db
            .get_drug(id)?
            .ok_or_else(|| LedgerError::NotFound(format!("Drug {} does not exist", id)))?;
        let events = self.log.events_for_drug(id)?;
        let verification = self.log.verify_chain()?;

        Ok(DrugProvenanceExport {
            metadata: self.metadata(),
            drug,
            events,
            chain_head: self.log.head()?,
            chain_valid: verification.is_valid(),
        })
    }

    /// Export every drug.
    pub fn export_all(&self) -> LedgerResult<BatchProvenanceExport> {
        let mut drugs = Vec::new();
        for drug in self.db.list_drugs()? {
            let events = self.log.events_for_drug(drug.id)?;
            drugs.push(DrugProvenanceEntry { drug, events });
        }
        let verification = self.log.verify_chain()?;

        info!("Exported provenance for {} drugs", drugs.len());
        Ok(BatchProvenanceExport {
            metadata: self.metadata(),
            chain_head: self.log.head()?,
            chain_valid: verification.is_valid(),
            event_count: verification.checked,
            drugs,
        })
    }

    fn metadata(&self) -> ExportMetadata {
        ExportMetadata {
            format_version: EXPORT_FORMAT_VERSION.to_string(),
            exported_at: Utc::now().to_rfc3339(),
            hash_algorithm: "SHA-256".to_string(),
            system_id: self.system_id.clone(),
        }
    }
}
