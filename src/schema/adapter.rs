//! Adapter for reading input.raw_event.v1 records
//!
//! Handles the two recorded formats (JSON array and NDJSON), bulk schema
//! validation, and merging independently captured device streams into the
//! single timestamp-ordered stream the analyzers expect.

use crate::error::InteractionError;
use crate::schema::raw_event::*;

/// Adapter for parsing and ordering raw events
pub struct RawEventAdapter;

impl RawEventAdapter {
    /// Parse a JSON string containing an array of RawEvents
    pub fn parse_array(json: &str) -> Result<Vec<RawEvent>, InteractionError> {
        let events: Vec<RawEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing RawEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawEvent>, InteractionError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(InteractionError::Parse(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Validate a batch of events, returning only the failures
    pub fn validate_events(events: &[RawEvent]) -> Vec<ValidationResult> {
        events
            .iter()
            .enumerate()
            .filter_map(|(idx, event)| {
                event.validate().err().map(|error| ValidationResult {
                    index: idx,
                    kind: event.kind,
                    error,
                })
            })
            .collect()
    }

    /// Interleave per-device streams by timestamp.
    ///
    /// Each stream keeps its own order: the merge only chooses which stream
    /// to take from next, so a device that goes backwards in time still does
    /// so in the output and its regressions are dropped at ingestion. Ties go
    /// to the earlier stream in `streams`.
    pub fn merge_streams(streams: Vec<Vec<RawEvent>>) -> Vec<RawEvent> {
        if streams.len() <= 1 {
            return streams.into_iter().flatten().collect();
        }

        let total = streams.iter().map(Vec::len).sum();
        let mut heads: Vec<_> = streams
            .into_iter()
            .map(|stream| stream.into_iter().peekable())
            .collect();
        let mut merged = Vec::with_capacity(total);

        loop {
            let mut next: Option<(usize, f64)> = None;
            for (idx, head) in heads.iter_mut().enumerate() {
                if let Some(event) = head.peek() {
                    let earlier = match next {
                        Some((_, best)) => event.timestamp.total_cmp(&best).is_lt(),
                        None => true,
                    };
                    if earlier {
                        next = Some((idx, event.timestamp));
                    }
                }
            }
            match next.and_then(|(idx, _)| heads[idx].next()) {
                Some(event) => merged.push(event),
                None => break,
            }
        }

        merged
    }
}

/// Schema failure for a single event in a batch
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub kind: EventKind,
    pub error: SchemaError,
}
