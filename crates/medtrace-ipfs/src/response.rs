//! IPFS HTTP API response handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Response parsing errors.
#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

pub type ResponseResult<T> = Result<T, ResponseError>;

/// One entry of an `/add` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddResponse {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Size", default)]
    pub size: String,
}

/// Parse an `/add` response body.
///
/// The API streams one JSON object per line; the last one describes the
/// uploaded root.
pub fn parse_add_response(body: &str) -> ResponseResult<AddResponse> {
    let line = body
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty())
        .ok_or_else(|| ResponseError::InvalidFormat("Empty response".into()))?;

    let response: AddResponse = serde_json::from_str(line)?;
    if response.hash.trim().is_empty() {
        return Err(ResponseError::InvalidFormat("IPFS hash is required".into()));
    }
    Ok(response)
}

/// Gateway URL for a content id.
pub fn gateway_url(base: &str, cid: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), cid.trim_start_matches('/'))
}
