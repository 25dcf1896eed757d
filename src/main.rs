mod backend;
mod buffer;
mod channel;
mod config;
mod error;
mod export;
mod forwarder;
mod ingest;
mod poller;

use backend::BackendClient;
use buffer::SampleBuffer;
use channel::Channel;
use config::Config;
use export::FILE_DELIMITER;
use forwarder::TelemetryForwarder;
use poller::{AcquisitionPoller, PollerCommand, PollerState, PollerUpdate};
use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long to wait for the poller to acknowledge a state transition.
const STATE_CHANGE_TIMEOUT: Duration = Duration::from_secs(10);

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: enose-telemetry <serial-port> <sample-name> [duration-secs]");
        std::process::exit(2);
    }
    let port = args[1].clone();
    let sample_name = args[2].trim().to_string();
    if sample_name.is_empty() {
        eprintln!("Sample name must not be empty");
        std::process::exit(2);
    }
    let duration_secs: u64 = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Could not load config ({}), using defaults", e);
            Config::default()
        }
    };

    let backend = match BackendClient::new(&config.backend_url, config.request_timeout_ms) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            log::error!("Failed to create backend client: {}", e);
            std::process::exit(1);
        }
    };
    let buffer = Arc::new(Mutex::new(SampleBuffer::new(
        config.max_points_display,
        config.poll_interval_secs(),
    )));
    let forwarder = Arc::new(TelemetryForwarder::new(config.influx.clone()));

    // Channel for updates from the poller thread back to this driver
    let (update_tx, update_rx) = mpsc::channel::<PollerUpdate>();
    let (poller, command_tx) = AcquisitionPoller::new(
        backend.clone(),
        buffer.clone(),
        forwarder,
        update_tx,
        config.poll_interval_ms,
    );

    // Spawn a thread to handle acquisition commands and the poll tick
    let poller_thread = std::thread::spawn(move || {
        poller.run();
    });

    let _ = command_tx.send(PollerCommand::Connect(port));
    if let Err(e) = wait_for_state(&update_rx, PollerState::Connected) {
        log::error!("Connect failed: {}", e);
        drop(command_tx);
        let _ = poller_thread.join();
        std::process::exit(1);
    }

    let _ = command_tx.send(PollerCommand::StartSampling(sample_name.clone()));
    if let Err(e) = wait_for_state(&update_rx, PollerState::Sampling) {
        log::error!("Start sampling failed: {}", e);
        let _ = command_tx.send(PollerCommand::Disconnect);
        drop(command_tx);
        let _ = poller_thread.join();
        std::process::exit(1);
    }

    log::info!(
        "Sampling '{}' for {}s at {}ms per frame",
        sample_name,
        duration_secs,
        config.poll_interval_ms
    );
    watch_session(&update_rx, &buffer, Duration::from_secs(duration_secs));

    let _ = command_tx.send(PollerCommand::StopSampling);
    let _ = wait_for_state(&update_rx, PollerState::Connected);

    // Export from the backend of record, not the display window
    export_session(&backend, &config, &sample_name);

    let _ = command_tx.send(PollerCommand::Disconnect);
    let _ = wait_for_state(&update_rx, PollerState::Idle);
    drop(command_tx);
    let _ = poller_thread.join();
}

/// Block until the poller reports the expected state, an error, or a
/// timeout. Frame updates arriving in between are ignored.
fn wait_for_state(
    update_rx: &mpsc::Receiver<PollerUpdate>,
    expected: PollerState,
) -> Result<(), String> {
    let deadline = Instant::now() + STATE_CHANGE_TIMEOUT;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or_else(|| "Timed out waiting for poller".to_string())?;
        match update_rx.recv_timeout(remaining) {
            Ok(PollerUpdate::State(state)) if state == expected => return Ok(()),
            Ok(PollerUpdate::State(_)) => continue,
            Ok(PollerUpdate::Frame { .. }) => continue,
            Ok(PollerUpdate::Error(e)) => return Err(e),
            Err(_) => return Err("Timed out waiting for poller".to_string()),
        }
    }
}

/// Drain updates for the sampling duration, logging current channel values
/// once a second or so.
fn watch_session(
    update_rx: &mpsc::Receiver<PollerUpdate>,
    buffer: &Arc<Mutex<SampleBuffer>>,
    duration: Duration,
) {
    let deadline = Instant::now() + duration;
    let mut frames: u64 = 0;

    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match update_rx.recv_timeout(remaining) {
            Ok(PollerUpdate::Frame { time_sec }) => {
                frames += 1;
                if frames % 4 == 0 {
                    let buffer = buffer.lock().unwrap();
                    let labels: Vec<String> = Channel::all()
                        .iter()
                        .map(|c| format!("{}={}", c.name(), buffer.current_label(*c)))
                        .collect();
                    log::info!("t={:.2}s {}", time_sec, labels.join(" "));
                }
            }
            Ok(PollerUpdate::Error(e)) => log::error!("{}", e),
            Ok(PollerUpdate::State(state)) => log::info!("Poller state: {:?}", state),
            Err(_) => break,
        }
    }

    log::info!("Session window elapsed, {} frames accepted", frames);

    // Per-channel summary over the retained display window
    let buffer = buffer.lock().unwrap();
    if buffer.is_empty() {
        return;
    }
    let visible: HashSet<usize> = (0..channel::CHANNEL_COUNT).collect();
    let series = buffer.visible_series(&visible);
    let span_start = series
        .first()
        .and_then(|view| view.time.first().copied())
        .unwrap_or(0.0);
    for view in &series {
        let (min, max) = view
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        log::info!(
            "{}: {} points in window, min {:.3}, max {:.3}",
            view.channel.name(),
            view.values.len(),
            min,
            max
        );
    }
    log::info!(
        "Window holds {} frames spanning t={:.2}s..{:.2}s",
        buffer.len(),
        span_start,
        buffer.last_time().unwrap_or(0.0)
    );
}

/// Fetch the full history and write the tabular and structured exports,
/// plus the ML-ingestion upload when a key is configured.
fn export_session(backend: &Arc<BackendClient>, config: &Config, sample_name: &str) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to create export runtime: {}", e);
            return;
        }
    };

    let history = match rt.block_on(backend.fetch_history()) {
        Ok(history) => history,
        Err(e) => {
            log::error!("Could not fetch history from backend: {}", e);
            return;
        }
    };
    if history.is_empty() {
        log::warn!("No data in backend history, nothing to export");
        return;
    }

    let names = Channel::names();

    let csv_path = format!("{}.csv", sample_name);
    match export::write_tabular(
        Path::new(&csv_path),
        &history,
        &names,
        config.poll_interval_ms,
        FILE_DELIMITER,
    ) {
        Ok(()) => log::info!("Exported {} rows to {}", history.len(), csv_path),
        Err(e) => log::error!("{}", e),
    }

    let json_path = format!("{}.json", sample_name);
    match export::write_structured(Path::new(&json_path), &history, &names) {
        Ok(()) => log::info!("Exported structured data to {}", json_path),
        Err(e) => log::error!("{}", e),
    }

    if !config.ingestion.api_key.is_empty() {
        match export::to_ml_upload(&history, &names, config.poll_interval_ms, sample_name)
            .map_err(|e| e.to_string())
            .and_then(|payload| {
                ingest::upload(payload, &config.ingestion).map_err(|e| e.to_string())
            }) {
            Ok(()) => log::info!("Uploaded {} rows to ingestion service", history.len()),
            Err(e) => log::error!("Upload failed: {}", e),
        }
    }
}
