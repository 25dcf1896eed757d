//! # Export Module
//!
//! Pure transformations from the backend's retained history into the three
//! downstream formats: a semicolon-delimited tabular file, a transposed JSON
//! document, and a comma-delimited ML-ingestion payload.
//!
//! Everything here consumes the history fetched from the backend of record,
//! never the live display buffer — the display window is bounded and would
//! silently truncate an export.
//!
//! The backend returns values without timestamps, so row timestamps are
//! synthesized as `row_index * poll_interval_ms`, the same constant that
//! drives the live time axis.

use crate::error::ExportError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Delimiter for the local tabular file export.
pub const FILE_DELIMITER: u8 = b';';
/// Delimiter for the ML-ingestion payload.
pub const ML_DELIMITER: u8 = b',';

/// One channel's full history column in the structured export.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub name: String,
    pub data: Vec<f64>,
}

/// Column-major view of the history: `{"signals": [{name, data}, ...]}`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StructuredExport {
    pub signals: Vec<Signal>,
}

/// In-memory ML-ingestion upload: payload bytes plus the label and filename
/// headers the ingestion service expects. Building it has no side effects;
/// the actual HTTP POST lives in the ingest module.
#[derive(Debug)]
pub struct MlPayload {
    pub data: Vec<u8>,
    pub filename: String,
    pub label: String,
}

/// Header plus one row per history frame: `[timestamp, v0, .., vN-1]`.
fn tabular_rows(history: &[Vec<f64>], names: &[&str], interval_ms: u64) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(history.len() + 1);

    let mut header = Vec::with_capacity(names.len() + 1);
    header.push("timestamp".to_string());
    header.extend(names.iter().map(|n| n.to_string()));
    rows.push(header);

    for (idx, frame) in history.iter().enumerate() {
        let mut row = Vec::with_capacity(frame.len() + 1);
        row.push((idx as u64 * interval_ms).to_string());
        row.extend(frame.iter().map(|v| v.to_string()));
        rows.push(row);
    }

    rows
}

/// Serialize the history as delimited text in memory.
pub fn tabular_bytes(
    history: &[Vec<f64>],
    names: &[&str],
    interval_ms: u64,
    delimiter: u8,
) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for row in tabular_rows(history, names, interval_ms) {
        writer.write_record(&row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// Write the history to a delimited file. Refuses an empty history so the
/// caller reports "no data" instead of producing a header-only file.
pub fn write_tabular(
    path: &Path,
    history: &[Vec<f64>],
    names: &[&str],
    interval_ms: u64,
    delimiter: u8,
) -> Result<(), ExportError> {
    if history.is_empty() {
        return Err(ExportError::NoData);
    }
    let bytes = tabular_bytes(history, names, interval_ms, delimiter)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Transpose the row-major history into one column per channel.
///
/// Total over malformed input: an empty history yields an empty signal
/// list, and when rows are shorter than the channel count the transpose
/// truncates to the shortest row, dropping the trailing channels rather
/// than panicking.
pub fn to_structured(history: &[Vec<f64>], names: &[&str]) -> StructuredExport {
    let columns = history.iter().map(|row| row.len()).min().unwrap_or(0);

    let signals = names
        .iter()
        .enumerate()
        .take(columns)
        .map(|(i, name)| Signal {
            name: name.to_string(),
            data: history.iter().map(|row| row[i]).collect(),
        })
        .collect();

    StructuredExport { signals }
}

/// Write the structured export as pretty-printed JSON.
pub fn write_structured(
    path: &Path,
    history: &[Vec<f64>],
    names: &[&str],
) -> Result<(), ExportError> {
    if history.is_empty() {
        return Err(ExportError::NoData);
    }
    let document = to_structured(history, names);
    let json = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Build the ML-ingestion payload: comma-delimited tabular bytes tagged
/// with the sample name as both label and filename stem.
pub fn to_ml_upload(
    history: &[Vec<f64>],
    names: &[&str],
    interval_ms: u64,
    sample_name: &str,
) -> Result<MlPayload, ExportError> {
    if history.is_empty() {
        return Err(ExportError::NoData);
    }
    let data = tabular_bytes(history, names, interval_ms, ML_DELIMITER)?;
    Ok(MlPayload {
        data,
        filename: format!("{}.csv", sample_name),
        label: sample_name.to_string(),
    })
}
