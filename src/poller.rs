//! # Acquisition Poller Module
//!
//! Drives the live telemetry path: connection lifecycle against the
//! acquisition backend and the periodic poll tick that feeds the sample
//! buffer and the telemetry forwarder.
//!
//! ## Key Components
//! - `AcquisitionPoller`: owns the command loop, runs in a dedicated thread
//!   with its own Tokio runtime so backend I/O never blocks the caller
//! - `PollerCommand`: commands sent from the session driver
//! - `PollerUpdate`: state changes and accepted frames sent back
//!
//! ## Failure tiers
//! Poll tick failures (network, malformed payload, short frame) are
//! absorbed: the tick is skipped, nothing is surfaced, the next tick is
//! unaffected. User-initiated actions (connect, start, reset's backend leg)
//! surface the backend's error text through `PollerUpdate::Error`.
//! Disconnect swallows everything; it is a cleanup path and must not fail
//! visibly.

use crate::backend::BackendClient;
use crate::buffer::SampleBuffer;
use crate::forwarder::TelemetryForwarder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub enum PollerCommand {
    Connect(String),
    StartSampling(String),
    StopSampling,
    Reset,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollerState {
    Idle,
    Connected,
    Sampling,
}

#[derive(Debug, Clone)]
pub enum PollerUpdate {
    State(PollerState),
    /// One frame accepted into the buffer, with its derived time
    Frame { time_sec: f64 },
    /// A user-initiated action failed; message quotes the backend
    Error(String),
}

/// Reject invalid sampling starts before any backend call is made.
fn can_start(state: &PollerState, sample_name: &str) -> Result<(), &'static str> {
    if sample_name.trim().is_empty() {
        return Err("Sample name must not be empty");
    }
    match state {
        PollerState::Connected => Ok(()),
        PollerState::Idle => Err("Not connected"),
        PollerState::Sampling => Err("Already sampling"),
    }
}

/// Reset would truncate the buffer mid-append if the tick were active.
fn can_reset(state: &PollerState) -> Result<(), &'static str> {
    match state {
        PollerState::Sampling => Err("Cannot reset while sampling is active"),
        _ => Ok(()),
    }
}

/// Runs the acquisition command loop and the poll tick.
///
/// Mirrors the session lifecycle: Idle → Connected → Sampling → Connected
/// → Idle, with disconnect reachable from any state. The sampling tick is
/// a single spawned task whose awaits are sequential, so ticks can never
/// overlap and the buffer sees one writer at a time.
pub struct AcquisitionPoller {
    command_rx: mpsc::Receiver<PollerCommand>,
    update_tx: mpsc::Sender<PollerUpdate>,
    backend: Arc<BackendClient>,
    buffer: Arc<Mutex<SampleBuffer>>,
    forwarder: Arc<TelemetryForwarder>,
    poll_interval_ms: u64,
}

impl AcquisitionPoller {
    /// Creates a new poller.
    ///
    /// Returns the poller and a sender for issuing commands from the
    /// session driver thread.
    pub fn new(
        backend: Arc<BackendClient>,
        buffer: Arc<Mutex<SampleBuffer>>,
        forwarder: Arc<TelemetryForwarder>,
        update_tx: mpsc::Sender<PollerUpdate>,
        poll_interval_ms: u64,
    ) -> (Self, mpsc::Sender<PollerCommand>) {
        let (command_tx, command_rx) = mpsc::channel();

        let poller = AcquisitionPoller {
            command_rx,
            update_tx,
            backend,
            buffer,
            forwarder,
            poll_interval_ms,
        };

        (poller, command_tx)
    }

    /// Runs the command loop. Call from a spawned thread; blocks until the
    /// command channel is closed.
    pub fn run(self) {
        let rt = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("Failed to create async runtime: {}", e);
                let _ = self
                    .update_tx
                    .send(PollerUpdate::Error(format!("Failed to create async runtime: {}", e)));
                return;
            }
        };

        let mut state = PollerState::Idle;
        let mut stop_flag: Option<Arc<AtomicBool>> = None;

        while let Ok(command) = self.command_rx.recv() {
            match command {
                PollerCommand::Connect(port) => {
                    log::info!("Poller: connecting backend to port {}", port);
                    match rt.block_on(self.backend.connect(&port)) {
                        Ok(()) => {
                            state = PollerState::Connected;
                            let _ = self.update_tx.send(PollerUpdate::State(state.clone()));
                        }
                        Err(e) => {
                            // Stay Idle; the user sees the backend's message
                            log::error!("Connect failed: {}", e);
                            let _ = self.update_tx.send(PollerUpdate::Error(e.to_string()));
                        }
                    }
                }
                PollerCommand::StartSampling(sample_name) => {
                    if let Err(reason) = can_start(&state, &sample_name) {
                        let _ = self.update_tx.send(PollerUpdate::Error(reason.to_string()));
                        continue;
                    }
                    log::info!("Poller: starting sampling for '{}'", sample_name);
                    match rt.block_on(self.backend.start_sampling()) {
                        Ok(()) => {
                            // Each sampling run gets its own stop flag so a
                            // stale task from a previous run cannot outlive it
                            let should_stop = Arc::new(AtomicBool::new(false));
                            stop_flag = Some(should_stop.clone());

                            rt.spawn(sampling_loop(
                                self.backend.clone(),
                                self.buffer.clone(),
                                self.forwarder.clone(),
                                self.update_tx.clone(),
                                sample_name,
                                self.poll_interval_ms,
                                should_stop,
                            ));

                            state = PollerState::Sampling;
                            let _ = self.update_tx.send(PollerUpdate::State(state.clone()));
                        }
                        Err(e) => {
                            log::error!("Start sampling failed: {}", e);
                            let _ = self.update_tx.send(PollerUpdate::Error(e.to_string()));
                        }
                    }
                }
                PollerCommand::StopSampling => {
                    log::info!("Poller: stopping sampling");
                    if let Some(flag) = stop_flag.take() {
                        flag.store(true, Ordering::Relaxed);
                    }
                    if let Err(e) = rt.block_on(self.backend.stop_sampling()) {
                        log::error!("Stop sampling failed: {}", e);
                        let _ = self.update_tx.send(PollerUpdate::Error(e.to_string()));
                    }
                    // The tick is already cancelled either way
                    if state == PollerState::Sampling {
                        state = PollerState::Connected;
                        let _ = self.update_tx.send(PollerUpdate::State(state.clone()));
                    }
                }
                PollerCommand::Reset => {
                    if let Err(reason) = can_reset(&state) {
                        let _ = self.update_tx.send(PollerUpdate::Error(reason.to_string()));
                        continue;
                    }
                    // Local clear is unconditional; the backend leg is
                    // best-effort and its failure does not undo it
                    self.buffer.lock().unwrap().reset();
                    log::info!("Poller: local buffers cleared");
                    match rt.block_on(self.backend.reset()) {
                        Ok(()) => log::info!("Backend history cleared"),
                        Err(e) => {
                            log::error!("Backend reset failed: {}", e);
                            let _ = self.update_tx.send(PollerUpdate::Error(format!(
                                "Local buffers cleared, but backend reset failed: {}",
                                e
                            )));
                        }
                    }
                }
                PollerCommand::Disconnect => {
                    log::info!("Poller: disconnecting");
                    if let Some(flag) = stop_flag.take() {
                        flag.store(true, Ordering::Relaxed);
                    }
                    // Best-effort cleanup; disconnect never reports failure
                    if let Err(e) = rt.block_on(self.backend.disconnect()) {
                        log::debug!("Disconnect error swallowed: {}", e);
                    }
                    state = PollerState::Idle;
                    let _ = self.update_tx.send(PollerUpdate::State(state.clone()));
                }
            }
        }

        // Command channel closed: cancel any active tick and exit
        if let Some(flag) = stop_flag.take() {
            flag.store(true, Ordering::Relaxed);
        }
        log::info!("Poller: command channel closed, shutting down");
    }
}

/// The periodic poll tick.
///
/// One fetch per tick; a well-formed frame is appended to the buffer and
/// forwarded, anything else skips the tick silently. Awaits are sequential,
/// so a slow fetch delays the next tick instead of overlapping it.
async fn sampling_loop(
    backend: Arc<BackendClient>,
    buffer: Arc<Mutex<SampleBuffer>>,
    forwarder: Arc<TelemetryForwarder>,
    update_tx: mpsc::Sender<PollerUpdate>,
    sample_name: String,
    poll_interval_ms: u64,
    should_stop: Arc<AtomicBool>,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(poll_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if should_stop.load(Ordering::Relaxed) {
            break;
        }

        match backend.fetch_data().await {
            Ok(values) => {
                let accepted = buffer.lock().unwrap().append(&values);
                match accepted {
                    Some(time_sec) => {
                        forwarder.forward(&sample_name, &values, chrono::Utc::now());
                        let _ = update_tx.send(PollerUpdate::Frame { time_sec });
                    }
                    None => {
                        log::debug!("Skipping short frame ({} values)", values.len());
                    }
                }
            }
            Err(e) => {
                // Dropped samples are acceptable; stalling is not
                log::debug!("Poll tick failed, skipping: {}", e);
            }
        }
    }

    log::debug!("Sampling loop for '{}' ended", sample_name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_requires_nonempty_name() {
        assert!(can_start(&PollerState::Connected, "").is_err());
        assert!(can_start(&PollerState::Connected, "   ").is_err());
        assert!(can_start(&PollerState::Connected, "roast_a").is_ok());
    }

    #[test]
    fn test_start_requires_connected_state() {
        assert!(can_start(&PollerState::Idle, "roast_a").is_err());
        assert!(can_start(&PollerState::Sampling, "roast_a").is_err());
    }

    #[test]
    fn test_reset_rejected_while_sampling() {
        assert!(can_reset(&PollerState::Sampling).is_err());
        assert!(can_reset(&PollerState::Connected).is_ok());
        assert!(can_reset(&PollerState::Idle).is_ok());
    }

    #[test]
    fn test_poller_accepts_commands_before_run() {
        let backend = Arc::new(BackendClient::new("http://127.0.0.1:8000", 2000).unwrap());
        let buffer = Arc::new(Mutex::new(SampleBuffer::new(1500, 0.25)));
        let forwarder = Arc::new(TelemetryForwarder::new(Default::default()));
        let (update_tx, _update_rx) = mpsc::channel();
        let (_poller, command_tx) =
            AcquisitionPoller::new(backend, buffer, forwarder, update_tx, 250);
        assert!(command_tx.send(PollerCommand::Disconnect).is_ok());
    }
}
