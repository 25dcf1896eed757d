//! # Acquisition Backend Client Module
//!
//! HTTP client for the acquisition backend, which owns the serial link to
//! the sensor hardware and keeps the full, unbounded sample history for the
//! current session. The client is deliberately thin: one method per
//! endpoint, short per-request timeout, no retries. Whether a failure is
//! absorbed or surfaced is the caller's decision, not this module's.
//!
//! ## Endpoints
//! - `POST /connect {port}` / `POST /disconnect`
//! - `POST /start_sampling` / `POST /stop_sampling`
//! - `POST /reset` — clear the backend's retained history
//! - `GET /data` — latest frame, `{"values": [f64]}`
//! - `GET /history` — full retained history, `{"data": [[f64]]}`

use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct PortRequest {
    port: String,
}

#[derive(Debug, Deserialize)]
struct DataResponse {
    #[serde(default)]
    values: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Vec<Vec<f64>>,
}

/// Client for the acquisition backend's HTTP surface.
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    /// Create a client with a bounded per-request timeout so a hung backend
    /// degrades to dropped ticks rather than a frozen poll loop.
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success status to an error carrying the backend's own body
    /// text, so user-facing messages quote the backend verbatim.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(BackendError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn post(&self, path: &str) -> Result<(), BackendError> {
        let response = self.client.post(self.url(path)).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Ask the backend to open the given serial port.
    pub async fn connect(&self, port: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url("/connect"))
            .json(&PortRequest {
                port: port.to_string(),
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), BackendError> {
        self.post("/disconnect").await
    }

    pub async fn start_sampling(&self) -> Result<(), BackendError> {
        self.post("/start_sampling").await
    }

    pub async fn stop_sampling(&self) -> Result<(), BackendError> {
        self.post("/stop_sampling").await
    }

    /// Clear the backend's retained history.
    pub async fn reset(&self) -> Result<(), BackendError> {
        self.post("/reset").await
    }

    /// Fetch the latest frame. One call per poll tick.
    pub async fn fetch_data(&self) -> Result<Vec<f64>, BackendError> {
        let response = self.client.get(self.url("/data")).send().await?;
        let response = Self::check(response).await?;
        let payload: DataResponse = response.json().await?;
        Ok(payload.values)
    }

    /// Fetch the backend's full retained history for export.
    ///
    /// All-or-nothing: any failure is returned to the caller, which must
    /// surface it (export is a deliberate user action, not background work).
    pub async fn fetch_history(&self) -> Result<Vec<Vec<f64>>, BackendError> {
        let response = self.client.get(self.url("/history")).send().await?;
        let response = Self::check(response).await?;
        let payload: HistoryResponse = response.json().await?;
        Ok(payload.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_response_parsing() {
        let payload: DataResponse =
            serde_json::from_str(r#"{"values": [1.0, 2.5, 3.0]}"#).unwrap();
        assert_eq!(payload.values, vec![1.0, 2.5, 3.0]);
    }

    #[test]
    fn test_data_response_missing_values_field() {
        let payload: DataResponse = serde_json::from_str("{}").unwrap();
        assert!(payload.values.is_empty());
    }

    #[test]
    fn test_history_response_parsing() {
        let payload: HistoryResponse =
            serde_json::from_str(r#"{"data": [[1.0, 2.0], [3.0, 4.0]]}"#).unwrap();
        assert_eq!(payload.data.len(), 2);
        assert_eq!(payload.data[1], vec![3.0, 4.0]);
    }

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client = BackendClient::new("http://127.0.0.1:8000/", 2000).unwrap();
        assert_eq!(client.url("/data"), "http://127.0.0.1:8000/data");
    }
}
