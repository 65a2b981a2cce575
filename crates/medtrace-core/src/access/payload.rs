//! Record bodies kept in a content store.

use log::{debug, warn};
use serde::Serialize;

use super::RecordAccessStore;
use crate::content::{get_json, put_json, ContentId, ContentStore};
use crate::error::LedgerResult;
use crate::models::{Identity, MedicalRecord};

impl<'a> RecordAccessStore<'a> {
    /// Upload `payload` as JSON, then create a record referencing it.
    ///
    /// Nothing is written to the ledger when the upload fails.
    pub fn create_record_with_payload<T: Serialize + ?Sized>(
        &self,
        store: &dyn ContentStore,
        patient: &Identity,
        payload: &T,
        caller: &Identity,
    ) -> LedgerResult<MedicalRecord> {
        let content_id = put_json(store, payload).map_err(|e| {
            warn!("Upload for {}'s record failed: {}", patient, e);
            e
        })?;
        debug!("Uploaded record body for {} as {}", patient, content_id);
        self.create_record(patient, content_id.as_str(), caller)
    }

    /// Fetch and decode a record body after the usual read check.
    pub fn fetch_record_payload(
        &self,
        store: &dyn ContentStore,
        id: u64,
        caller: &Identity,
    ) -> LedgerResult<serde_json::Value> {
        let record = self.get_record_details(id, caller)?;
        let content_id = ContentId::parse(record.payload_ref)?;
        Ok(get_json(store, &content_id)?)
    }
}
