//! In-process content store.

use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;

use super::{ContentError, ContentId, ContentResult, ContentStore};
use crate::audit::hash_data;

/// Content-addressed store kept in memory; ids are SHA-256 hex digests.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs. A poisoned lock still reports its contents.
    pub fn len(&self) -> usize {
        match self.blobs.lock() {
            Ok(blobs) => blobs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStore for MemoryContentStore {
    fn put(&self, data: &[u8]) -> ContentResult<ContentId> {
        let id = hash_data(data);
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| ContentError::Unavailable(format!("Lock poisoned: {}", e)))?;
        blobs.entry(id.clone()).or_insert_with(|| data.to_vec());
        debug!("Stored {} bytes as {}", data.len(), id);
        ContentId::parse(id)
    }

    fn get(&self, id: &ContentId) -> ContentResult<Vec<u8>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|e| ContentError::Unavailable(format!("Lock poisoned: {}", e)))?;
        blobs
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ContentError::NotFound(id.to_string()))
    }
}
