//! Output sinks
//!
//! The engine hands finished feature vectors to an [`OutputSink`]. Network and
//! database bindings live with the host; this module provides the two-line
//! delimited table format and two local sinks (CSV file export and an NDJSON
//! record writer).

use crate::encoder::{FeatureEncoder, FeatureRecord};
use crate::error::{InteractionError, TransmitError};
use crate::types::{Ack, FeatureVector, FEATURE_FIELDS};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default local export file name
pub const DEFAULT_EXPORT_FILE: &str = "interaction_data.csv";

/// Destination for finished feature vectors
pub trait OutputSink {
    /// Short sink name used in acknowledgements and logs
    fn name(&self) -> &str;

    /// Deliver one vector. Implementations must not retry internally.
    fn submit(&mut self, vector: &FeatureVector) -> Result<Ack, TransmitError>;
}

/// Two-line comma-separated table: header of field names, one value row.
///
/// Values are not escaped; a user id containing a comma corrupts the row.
pub fn serialize(vector: &FeatureVector) -> Result<String, InteractionError> {
    write_table(std::slice::from_ref(vector))
}

/// Header row followed by one value row per vector
pub fn write_table(vectors: &[FeatureVector]) -> Result<String, InteractionError> {
    let mut buf = Vec::new();
    write_rows(&mut table_writer(&mut buf), vectors)?;
    String::from_utf8(buf).map_err(|e| InteractionError::Parse(e.to_string()))
}

fn table_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

fn write_rows<W: Write>(
    writer: &mut csv::Writer<W>,
    vectors: &[FeatureVector],
) -> Result<(), csv::Error> {
    writer.write_record(FEATURE_FIELDS)?;
    for vector in vectors {
        writer.write_record(value_row(vector))?;
    }
    writer.flush()?;
    Ok(())
}

fn value_row(vector: &FeatureVector) -> Vec<String> {
    let mut values = Vec::with_capacity(FEATURE_FIELDS.len());
    values.push(vector.user_id.clone());
    for (name, value) in vector.numeric_fields() {
        match name {
            "jitter" | "clickPattern" => values.push(format!("{}", value as u64)),
            _ => values.push(format!("{value:.2}")),
        }
    }
    values
}

/// Parse a table produced by [`serialize`] back into a vector
pub fn parse_table(text: &str) -> Result<FeatureVector, InteractionError> {
    parse_rows(text)?
        .into_iter()
        .next()
        .ok_or_else(|| InteractionError::Parse("Missing value row".to_string()))
}

/// Parse every value row of a table produced by [`write_table`]
pub fn parse_rows(text: &str) -> Result<Vec<FeatureVector>, InteractionError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| InteractionError::Parse(format!("Failed to read header row: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(InteractionError::Parse("Missing header row".to_string()));
    }

    let mut vectors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| InteractionError::Parse(format!("Row {}: {e}", idx + 1)))?;
        let cells: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(record.iter())
            .collect();
        vectors.push(vector_from_cells(&cells)?);
    }
    Ok(vectors)
}

fn vector_from_cells(cells: &HashMap<&str, &str>) -> Result<FeatureVector, InteractionError> {
    let text_cell = |name: &str| -> Result<&str, InteractionError> {
        cells
            .get(name)
            .copied()
            .ok_or_else(|| InteractionError::Parse(format!("Missing column {name}")))
    };
    let number = |name: &str| -> Result<f64, InteractionError> {
        let raw = text_cell(name)?;
        raw.parse::<f64>()
            .map_err(|e| InteractionError::Parse(format!("Column {name}: {e}")))
    };
    let count = |name: &str| -> Result<u64, InteractionError> {
        let raw = text_cell(name)?;
        raw.parse::<u64>()
            .map_err(|e| InteractionError::Parse(format!("Column {name}: {e}")))
    };

    Ok(FeatureVector {
        user_id: text_cell("userId")?.to_string(),
        avg_cursor_speed: number("avgCursorSpeed")?,
        cursor_acceleration: number("cursorAcceleration")?,
        path_deviation: number("pathDeviation")?,
        idle_time: number("idleTime")?,
        jitter: count("jitter")?,
        click_pattern: count("clickPattern")?,
        typing_speed: number("typingSpeed")?,
        key_press_duration: number("keyPressDuration")?,
        key_transition_time: number("keyTransitionTime")?,
        key_transition_std_dev: number("keyTransitionStdDev")?,
        typing_accuracy: number("typingAccuracy")?,
        error_rate: number("errorRate")?,
        session_duration: number("sessionDuration")?,
        average_dwell_time: number("averageDwellTime")?,
        scroll_behavior: number("scrollBehavior")?,
        interaction_complexity: number("interactionComplexity")?,
    })
}

/// Turn an NDJSON store written by [`NdjsonSink`] into one table with a row
/// per stored record, in store order
pub fn export_records(ndjson: &str) -> Result<String, InteractionError> {
    let mut vectors = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: FeatureRecord = serde_json::from_str(trimmed).map_err(|e| {
            InteractionError::Parse(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;
        vectors.push(record.features);
    }
    write_table(&vectors)
}

/// Writes each submitted vector as a delimited table file
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sink writing [`DEFAULT_EXPORT_FILE`] inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DEFAULT_EXPORT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for CsvFileSink {
    fn name(&self) -> &str {
        "csv-file"
    }

    fn submit(&mut self, vector: &FeatureVector) -> Result<Ack, TransmitError> {
        let file = File::create(&self.path)?;
        write_rows(&mut table_writer(file), std::slice::from_ref(vector))?;
        Ok(Ack {
            sink: self.name().to_string(),
            reference: Some(self.path.display().to_string()),
        })
    }
}

/// Appends one encoded JSON record per submitted vector to a writer
pub struct NdjsonSink<W: Write> {
    writer: W,
    encoder: FeatureEncoder,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            encoder: FeatureEncoder::new(),
        }
    }

    pub fn with_encoder(writer: W, encoder: FeatureEncoder) -> Self {
        Self { writer, encoder }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for NdjsonSink<W> {
    fn name(&self) -> &str {
        "ndjson"
    }

    fn submit(&mut self, vector: &FeatureVector) -> Result<Ack, TransmitError> {
        let record = self.encoder.encode(vector);
        let line = serde_json::to_string(&record)
            .map_err(|e| TransmitError::Rejected(e.to_string()))?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(Ack {
            sink: self.name().to_string(),
            reference: Some(record.record_id),
        })
    }
}
