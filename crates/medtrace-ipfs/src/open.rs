//! Core handles whose record bodies live on IPFS.

use std::path::Path;
use std::sync::Arc;

use log::info;
use medtrace_core::{MedtraceConfig, MedtraceCore, MedtraceError};

use crate::client::IpfsClient;

/// Open the configured database with an [`IpfsClient`] built from
/// `config.content`.
pub fn open_core(config: &MedtraceConfig) -> Result<Arc<MedtraceCore>, MedtraceError> {
    let client = IpfsClient::new(&config.content)?;
    let db = config.open_database()?;
    info!("Record bodies stored via {}", client.api_url());
    Ok(MedtraceCore::with_content_store(
        db,
        config.patient_records_policy,
        Arc::new(client),
    ))
}

/// Load a JSON config file, apply `MEDTRACE_*` overrides and open it.
pub fn open_with_ipfs<P: AsRef<Path>>(config_path: P) -> Result<Arc<MedtraceCore>, MedtraceError> {
    let mut config = MedtraceConfig::load_from_file(config_path)?;
    config.apply_env()?;
    open_core(&config)
}

#[cfg(test)]
mod tests {
    use medtrace_core::ContentStoreConfig;

    use super::*;

    fn offline() -> MedtraceConfig {
        MedtraceConfig {
            content: ContentStoreConfig {
                api_url: "http://127.0.0.1:1/api/v0".into(),
                gateway_url: "http://127.0.0.1:1/ipfs/".into(),
                timeout_secs: 2,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_upload_failure_writes_nothing() {
        let core = open_core(&offline()).unwrap();

        let err = core
            .create_record_with_payload("0xpatient".into(), r#"{"a":1}"#.into(), "0xdoctor".into())
            .unwrap_err();
        assert!(matches!(err, MedtraceError::StorageUnavailable(_)));
        assert!(core
            .get_patient_records("0xpatient".into(), "0xpatient".into())
            .unwrap()
            .is_empty());
        assert!(core.event_chain_head().unwrap().is_none());
    }

    #[test]
    fn test_open_with_ipfs_reads_content_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("medtrace.json");
        std::fs::write(
            &config_path,
            r#"{"content": {"api_url": "http://127.0.0.1:1/api/v0", "timeout_secs": 2}}"#,
        )
        .unwrap();

        let core = open_with_ipfs(&config_path).unwrap();
        // Plain references still work without the node
        core.create_record("0xpatient".into(), "QmTestHash".into(), "0xdoctor".into())
            .unwrap();
        let err = core.fetch_record_payload(1, "0xpatient".into()).unwrap_err();
        assert!(matches!(err, MedtraceError::StorageUnavailable(_)));
    }
}
