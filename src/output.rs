//! Output formatting for archive listings, samples and log statistics.
//!
//! Supports plain line listings, JSON sample arrays, and CSV append.

use anyhow::Result;
use tracing::{debug, info};

use crate::archive::names::SampleWidth;
use crate::stats::LogStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Decodes a binned sample file. Negative samples (missing data) become `None`.
///
/// A trailing partial sample is ignored.
pub fn decode_samples(bytes: &[u8], width: SampleWidth) -> Vec<Option<i16>> {
    let value = |raw: i16| (raw >= 0).then_some(raw);
    match width {
        SampleWidth::Byte => bytes.iter().map(|&b| value(i16::from(b as i8))).collect(),
        SampleWidth::Short => bytes
            .chunks_exact(2)
            .map(|c| value(i16::from_be_bytes([c[0], c[1]])))
            .collect(),
    }
}

/// Renders a binned sample file as a JSON array, missing samples as `null`.
pub fn samples_json(bytes: &[u8], width: SampleWidth) -> Result<String> {
    Ok(serde_json::to_string(&decode_samples(bytes, width))?)
}

/// Writes one item per line.
pub fn write_lines<W: Write, S: AsRef<str>>(mut w: W, items: &[S]) -> Result<()> {
    for item in items {
        writeln!(w, "{}", item.as_ref())?;
    }
    w.flush()?;
    Ok(())
}

/// Emits event-log field coverage at debug level, one field per line.
pub fn print_pretty(stats: &LogStats) {
    debug!("{:#?}", stats);
}

/// Reports event-log field coverage as a JSON object at info level.
pub fn print_json(stats: &LogStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Appends one coverage row for a sensor-day to the CSV file at `path`.
///
/// The header row is written only when the file is new, so rows from
/// repeated `inspect` runs accumulate under a single header.
pub fn append_record(path: &str, stats: &LogStats) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}
