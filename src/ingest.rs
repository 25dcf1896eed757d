//! # ML-Ingestion Upload Module
//!
//! Posts an already-built tabular payload to the ML-ingestion service as a
//! multipart file attachment, authenticated by a static API key and tagged
//! with label and filename headers. Payload construction lives in the
//! export module; this is the only place the payload touches the network.

use crate::config::IngestionConfig;
use crate::error::UploadError;
use crate::export::MlPayload;
use std::time::Duration;

const UPLOAD_TIMEOUT_SECS: u64 = 30;

/// Upload one payload. Blocking; meant to be called from the session
/// driver, outside the poll loop.
pub fn upload(payload: MlPayload, config: &IngestionConfig) -> Result<(), UploadError> {
    if config.api_key.is_empty() {
        return Err(UploadError::NotConfigured);
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
        .build()?;

    let part = reqwest::blocking::multipart::Part::bytes(payload.data)
        .file_name(payload.filename.clone())
        .mime_str("text/csv")?;
    let form = reqwest::blocking::multipart::Form::new().part("data", part);

    log::info!("Uploading {} to ingestion service", payload.filename);

    let response = client
        .post(&config.url)
        .header("x-api-key", &config.api_key)
        .header("x-label", &payload.label)
        .header("x-file-name", &payload.filename)
        .multipart(form)
        .send()?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(UploadError::Rejected {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_without_key_is_refused_before_any_request() {
        let config = IngestionConfig {
            url: "https://ingestion.invalid/api/training/files".to_string(),
            api_key: String::new(),
        };
        let payload = MlPayload {
            data: b"timestamp,a\n0,1\n".to_vec(),
            filename: "x.csv".to_string(),
            label: "x".to_string(),
        };
        assert!(matches!(
            upload(payload, &config),
            Err(UploadError::NotConfigured)
        ));
    }
}
