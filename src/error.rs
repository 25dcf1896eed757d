//! # Error Types Module
//!
//! Centralized error handling for the telemetry client. Each module gets its
//! own error enum so callers can match on failures without string parsing.
//!
//! Failures fall into two tiers:
//! - Live-path (poll tick) failures are absorbed by the poller and never
//!   reach these types' callers as anything but a debug log line.
//! - User-initiated actions (connect, export, upload, the remote leg of
//!   reset) surface these errors verbatim.

use std::fmt;

/// Errors from the acquisition backend HTTP surface
#[derive(Debug)]
pub enum BackendError {
    /// Transport-level failure (connection refused, timeout, bad URL)
    Request(reqwest::Error),
    /// Backend answered with a non-success status; body text preserved
    /// so the user sees the backend's own message
    Status { status: u16, body: String },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Request(e) => {
                write!(f, "Backend request failed: {}", e)
            }
            BackendError::Status { status, body } => {
                write!(f, "Backend returned HTTP {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Request(e) => Some(e),
            BackendError::Status { .. } => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Request(e)
    }
}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

/// Errors that can occur while writing export files
#[derive(Debug)]
pub enum ExportError {
    /// History was empty; nothing to export
    NoData,
    /// CSV serialization or file write failed
    Csv(csv::Error),
    /// JSON serialization failed
    Json(serde_json::Error),
    /// Plain file I/O failure
    Io(std::io::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::NoData => {
                write!(f, "No data available to export")
            }
            ExportError::Csv(e) => {
                write!(f, "CSV export failed: {}", e)
            }
            ExportError::Json(e) => {
                write!(f, "JSON export failed: {}", e)
            }
            ExportError::Io(e) => {
                write!(f, "Export file write failed: {}", e)
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::NoData => None,
            ExportError::Csv(e) => Some(e),
            ExportError::Json(e) => Some(e),
            ExportError::Io(e) => Some(e),
        }
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Json(e)
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

/// Errors from the ML-ingestion upload
#[derive(Debug)]
pub enum UploadError {
    /// No API key configured for the ingestion service
    NotConfigured,
    /// Transport-level failure reaching the ingestion service
    Request(reqwest::Error),
    /// Ingestion service rejected the file; response body preserved
    Rejected { status: u16, body: String },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::NotConfigured => {
                write!(f, "No ingestion API key configured")
            }
            UploadError::Request(e) => {
                write!(f, "Upload request failed: {}", e)
            }
            UploadError::Rejected { status, body } => {
                write!(f, "Upload rejected with HTTP {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        UploadError::Request(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_preserves_body() {
        let err = BackendError::Status {
            status: 500,
            body: "serial port busy".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("serial port busy"));
    }

    #[test]
    fn test_config_error_chain() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::ReadFailed(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_export_no_data_display() {
        assert!(ExportError::NoData.to_string().contains("No data"));
    }
}
