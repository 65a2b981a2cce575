//! Blocking IPFS client.

use std::time::Duration;

use log::{debug, info, warn};
use medtrace_core::config::ContentStoreConfig;
use medtrace_core::content::{ContentError, ContentId, ContentResult, ContentStore};
use reqwest::blocking::{multipart, Client};
use reqwest::StatusCode;

use crate::response::{gateway_url, parse_add_response};

/// File name the record body is uploaded under.
pub const UPLOAD_FILE_NAME: &str = "data.json";

/// Uploads through the IPFS HTTP API and reads back through a gateway.
pub struct IpfsClient {
    http: Client,
    api_url: String,
    gateway_url: String,
}

impl IpfsClient {
    pub fn new(config: &ContentStoreConfig) -> ContentResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(unavailable)?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            gateway_url: config.gateway_url.clone(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Public URL for `id`.
    pub fn url_for(&self, id: &ContentId) -> String {
        gateway_url(&self.gateway_url, id.as_str())
    }
}

impl ContentStore for IpfsClient {
    fn put(&self, data: &[u8]) -> ContentResult<ContentId> {
        let part = multipart::Part::bytes(data.to_vec())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("application/json")
            .map_err(unavailable)?;
        let form = multipart::Form::new().part("file", part);

        let url = format!("{}/add", self.api_url);
        debug!("Uploading {} bytes to {}", data.len(), url);
        let body = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| {
                warn!("IPFS upload failed: {}", e);
                unavailable(e)
            })?;

        let response = parse_add_response(&body)
            .map_err(|e| ContentError::Unavailable(e.to_string()))?;
        info!("Uploaded record body as {}", response.hash);
        ContentId::parse(response.hash)
    }

    fn get(&self, id: &ContentId) -> ContentResult<Vec<u8>> {
        let url = self.url_for(id);
        debug!("Fetching {}", url);
        let response = self.http.get(&url).send().map_err(unavailable)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ContentError::NotFound(id.to_string()));
        }
        let bytes = response
            .error_for_status()
            .and_then(|r| r.bytes())
            .map_err(unavailable)?;
        Ok(bytes.to_vec())
    }
}

fn unavailable(e: reqwest::Error) -> ContentError {
    ContentError::Unavailable(e.to_string())
}
