//! External blob storage for record bodies and attachments.
//!
//! The ledger only keeps a [`ContentId`]; the bytes live in a
//! [`ContentStore`] such as IPFS (see the `medtrace-ipfs` crate) or the
//! in-process [`MemoryContentStore`].

mod memory;

pub use memory::*;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content store errors.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Content store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid content id: {0}")]
    InvalidId(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ContentResult<T> = Result<T, ContentError>;

/// Address of a blob in a content store (e.g. an IPFS CID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Wrap a raw id, rejecting blank values.
    pub fn parse(raw: impl Into<String>) -> ContentResult<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ContentError::InvalidId("content id is required".into()));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blob storage addressed by content id.
pub trait ContentStore {
    /// Store bytes, returning their id.
    fn put(&self, data: &[u8]) -> ContentResult<ContentId>;

    /// Fetch the bytes stored under `id`.
    fn get(&self, id: &ContentId) -> ContentResult<Vec<u8>>;
}

/// Serialize `value` as JSON and store it.
pub fn put_json<T: Serialize + ?Sized>(
    store: &dyn ContentStore,
    value: &T,
) -> ContentResult<ContentId> {
    let bytes = serde_json::to_vec(value)?;
    store.put(&bytes)
}

/// Fetch `id` and decode it as JSON.
pub fn get_json<T: DeserializeOwned>(store: &dyn ContentStore, id: &ContentId) -> ContentResult<T> {
    let bytes = store.get(id)?;
    Ok(serde_json::from_slice(&bytes)?)
}
