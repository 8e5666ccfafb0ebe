//! Result Exporter
//!
//! Packs a batch result into a zip archive with one text file per device.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use chrono::{Datelike, NaiveDateTime, Timelike};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::types::BatchEntry;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Download name for an archive produced at `timestamp`
pub fn archive_name(timestamp: NaiveDateTime) -> String {
    format!("batch_results_{}.zip", timestamp.format("%Y%m%d_%H%M%S"))
}

/// Build the archive; identical input and timestamp give identical bytes
pub fn export_results(
    results: &[BatchEntry],
    timestamp: NaiveDateTime,
) -> Result<Vec<u8>, ExportError> {
    let mut options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    if let Some(stamp) = zip_timestamp(timestamp) {
        options = options.last_modified_time(stamp);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut used = HashSet::with_capacity(results.len());

    for entry in results {
        let name = unique_entry_name(&mut used, &entry.device, entry.status.as_str());
        zip.start_file(name, options)?;
        zip.write_all(entry.output.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Zip timestamps cover 1980..=2107 only
fn zip_timestamp(timestamp: NaiveDateTime) -> Option<zip::DateTime> {
    let year = u16::try_from(timestamp.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        timestamp.month() as u8,
        timestamp.day() as u8,
        timestamp.hour() as u8,
        timestamp.minute() as u8,
        timestamp.second() as u8,
    )
    .ok()
}

fn sanitize(device: &str) -> String {
    let cleaned: String = device
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ');
    if cleaned.is_empty() {
        "device".to_string()
    } else {
        cleaned.to_string()
    }
}

fn unique_entry_name(used: &mut HashSet<String>, device: &str, status: &str) -> String {
    let stem = format!("{}_{}", sanitize(device), status);
    let mut name = format!("{}.txt", stem);
    let mut suffix = 1;
    while !used.insert(name.clone()) {
        suffix += 1;
        name = format!("{}_{}.txt", stem, suffix);
    }
    name
}
