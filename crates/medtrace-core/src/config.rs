//! Runtime configuration.
//!
//! Loaded from a JSON file, then overridden by `MEDTRACE_*` environment
//! variables. Every field has a default, so an empty object is a valid file.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Database, DbResult};
use crate::models::PatientRecordsPolicy;

pub const ENV_DB_PATH: &str = "MEDTRACE_DB_PATH";
pub const ENV_PATIENT_RECORDS_POLICY: &str = "MEDTRACE_PATIENT_RECORDS_POLICY";
pub const ENV_IPFS_API_URL: &str = "MEDTRACE_IPFS_API_URL";
pub const ENV_IPFS_GATEWAY_URL: &str = "MEDTRACE_IPFS_GATEWAY_URL";
pub const ENV_IPFS_TIMEOUT_SECS: &str = "MEDTRACE_IPFS_TIMEOUT_SECS";

pub const DEFAULT_IPFS_API_URL: &str = "https://ipfs.infura.io:5001/api/v0";
pub const DEFAULT_IPFS_GATEWAY_URL: &str = "https://cloudflare-ipfs.com/ipfs/";
pub const DEFAULT_IPFS_TIMEOUT_SECS: u64 = 30;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MedtraceConfig {
    /// SQLite file; `None` means in-memory
    pub database_path: Option<PathBuf>,
    pub patient_records_policy: PatientRecordsPolicy,
    pub content: ContentStoreConfig,
}

/// Where record bodies are uploaded and fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContentStoreConfig {
    /// IPFS HTTP API base, without the trailing `/add`
    pub api_url: String,
    /// Gateway prefix the content id is appended to
    pub gateway_url: String,
    pub timeout_secs: u64,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_IPFS_API_URL.to_string(),
            gateway_url: DEFAULT_IPFS_GATEWAY_URL.to_string(),
            timeout_secs: DEFAULT_IPFS_TIMEOUT_SECS,
        }
    }
}

impl MedtraceConfig {
    /// Parse a JSON config file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`. Blank values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(policy) = get(ENV_PATIENT_RECORDS_POLICY) {
            self.patient_records_policy = parse_policy(&policy)?;
        }
        if let Some(url) = get(ENV_IPFS_API_URL) {
            self.content.api_url = url;
        }
        if let Some(url) = get(ENV_IPFS_GATEWAY_URL) {
            self.content.gateway_url = url;
        }
        if let Some(secs) = get(ENV_IPFS_TIMEOUT_SECS) {
            self.content.timeout_secs = secs.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_IPFS_TIMEOUT_SECS.to_string(),
                value: secs.clone(),
            })?;
        }
        debug!("Effective config: {:?}", self);
        Ok(())
    }

    /// Open the configured database, in memory when no path is set.
    pub fn open_database(&self) -> DbResult<Database> {
        match &self.database_path {
            Some(path) => Database::open(path),
            None => Database::open_in_memory(),
        }
    }
}

fn parse_policy(raw: &str) -> ConfigResult<PatientRecordsPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "patient_only" => Ok(PatientRecordsPolicy::PatientOnly),
        "any_grantee" => Ok(PatientRecordsPolicy::AnyGrantee),
        _ => Err(ConfigError::Invalid {
            key: ENV_PATIENT_RECORDS_POLICY.to_string(),
            value: raw.to_string(),
        }),
    }
}
