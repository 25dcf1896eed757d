//! # Telemetry Forwarding Module
//!
//! Best-effort forwarding of each live frame to an InfluxDB-compatible
//! time-series sink, tagged with the current sample name.
//!
//! ## Architecture
//! - **TelemetryForwarder**: handle owned by the poll path; `forward` only
//!   enqueues, it never touches the network
//! - **Worker Thread**: background thread that encodes line protocol and
//!   POSTs batches to the sink
//!
//! Forwarding is advisory telemetry. A slow or unreachable sink must never
//! delay an acquisition tick, so the queue is unbounded and every failure
//! on the worker side is logged and dropped. When no sink token is
//! configured the forwarder is created disabled and `forward` is a no-op.

use crate::channel::{Channel, CHANNEL_COUNT};
use crate::config::InfluxConfig;
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

const SINK_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
enum ForwarderCommand {
    Point {
        sample_name: String,
        values: Vec<f64>,
        timestamp_ns: i64,
    },
    Stop,
}

/// Handle for enqueueing measurements to the sink worker.
pub struct TelemetryForwarder {
    tx: Option<Sender<ForwarderCommand>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl TelemetryForwarder {
    /// Spawn the worker thread, or create a disabled forwarder when the
    /// sink has no token configured.
    pub fn new(config: InfluxConfig) -> Self {
        if config.token.is_empty() {
            log::info!("No time-series sink token configured, forwarding disabled");
            return Self {
                tx: None,
                worker: None,
            };
        }

        let (tx, rx) = unbounded();
        let worker = thread::spawn(move || {
            Self::worker_loop(rx, config);
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Enqueue one tagged frame. Non-blocking; safe to call from the tick
    /// path. Silently drops the point if the forwarder is disabled or the
    /// worker has exited.
    pub fn forward(&self, sample_name: &str, frame: &[f64], event_time: DateTime<Utc>) {
        if let Some(tx) = &self.tx {
            let command = ForwarderCommand::Point {
                sample_name: sample_name.to_string(),
                values: frame.iter().take(CHANNEL_COUNT).copied().collect(),
                timestamp_ns: event_time.timestamp_nanos_opt().unwrap_or(0),
            };
            if let Err(e) = tx.send(command) {
                log::debug!("Forwarder queue closed, dropping point: {}", e);
            }
        }
    }

    /// Worker thread loop.
    ///
    /// Accumulates encoded lines and flushes when the batch size is reached
    /// or the flush interval elapses with pending lines, mirroring the
    /// sink client's own batching policy.
    fn worker_loop(rx: Receiver<ForwarderCommand>, config: InfluxConfig) {
        let client = match reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(SINK_TIMEOUT_SECS))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                log::error!("Failed to build sink HTTP client: {}", e);
                return;
            }
        };

        let flush_interval = Duration::from_millis(config.flush_interval_ms.max(1));
        let mut batch: Vec<String> = Vec::new();

        loop {
            match rx.recv_timeout(flush_interval) {
                Ok(ForwarderCommand::Point {
                    sample_name,
                    values,
                    timestamp_ns,
                }) => {
                    batch.push(encode_line(
                        &config.measurement,
                        &sample_name,
                        &values,
                        timestamp_ns,
                    ));
                    if batch.len() >= config.batch_size {
                        Self::flush(&client, &config, &mut batch);
                    }
                }
                Ok(ForwarderCommand::Stop) => {
                    Self::flush(&client, &config, &mut batch);
                    log::info!("Forwarder worker stopped");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    Self::flush(&client, &config, &mut batch);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    Self::flush(&client, &config, &mut batch);
                    break;
                }
            }
        }
    }

    /// POST the pending batch to the sink. Failures are logged and the
    /// batch is dropped either way; forwarding never retries.
    fn flush(client: &reqwest::blocking::Client, config: &InfluxConfig, batch: &mut Vec<String>) {
        if batch.is_empty() {
            return;
        }

        let body = batch.join("\n");
        let count = batch.len();
        batch.clear();

        let url = format!("{}/api/v2/write", config.url.trim_end_matches('/'));
        let result = client
            .post(url)
            .query(&[
                ("org", config.org.as_str()),
                ("bucket", config.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", config.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send();

        match result {
            Ok(response) if response.status().is_success() => {
                log::debug!("Forwarded {} points to sink", count);
            }
            Ok(response) => {
                log::warn!(
                    "Sink rejected batch of {} points: HTTP {}",
                    count,
                    response.status()
                );
            }
            Err(e) => {
                log::warn!("Failed to forward batch of {} points: {}", count, e);
            }
        }
    }
}

impl Drop for TelemetryForwarder {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(ForwarderCommand::Stop);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Encode one frame as an InfluxDB line protocol record:
/// `measurement,sample_name=<tag> <field>=<v>,... <timestamp_ns>`.
/// One field per channel name, in wire order.
fn encode_line(measurement: &str, sample_name: &str, values: &[f64], timestamp_ns: i64) -> String {
    let fields = Channel::all()
        .iter()
        .zip(values.iter())
        .map(|(channel, value)| format!("{}={}", channel.name(), value))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{},sample_name={} {} {}",
        escape_tag(measurement),
        escape_tag(sample_name),
        fields,
        timestamp_ns
    )
}

/// Escape line protocol special characters in measurement and tag values.
fn escape_tag(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace(' ', "\\ ")
        .replace('=', "\\=")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_line_format() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.5, 7.0];
        let line = encode_line("enose", "roast_a", &values, 1_700_000_000_000_000_000);
        assert!(line.starts_with("enose,sample_name=roast_a NO2_multi=1,"));
        assert!(line.contains("C2H5OH_mics=6.5"));
        assert!(line.ends_with(" 1700000000000000000"));
        // Exactly one space-separated field set between tag set and timestamp
        assert_eq!(line.matches(' ').count(), 2);
    }

    #[test]
    fn test_encode_line_escapes_tag_values() {
        let values = [0.0; CHANNEL_COUNT];
        let line = encode_line("enose", "dark roast, batch=2", &values, 0);
        assert!(line.contains("sample_name=dark\\ roast\\,\\ batch\\=2"));
    }

    #[test]
    fn test_forwarder_disabled_without_token() {
        let config = InfluxConfig {
            token: String::new(),
            ..InfluxConfig::default()
        };
        let forwarder = TelemetryForwarder::new(config);
        // No worker, and forwarding is a harmless no-op
        forwarder.forward("sample", &[0.0; CHANNEL_COUNT], Utc::now());
        assert!(forwarder.tx.is_none());
    }
}
