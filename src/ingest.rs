//! Event ingestion
//!
//! Single ordered ingress for a session: validates raw events, enforces
//! non-decreasing timestamps, and converts them into the typed stream the
//! analyzers consume. Rejected events are never reordered or repaired.

use crate::attention::is_editable_target;
use crate::schema::{EventKind, RawEvent, SchemaError};
use crate::types::{InputEvent, TimedEvent};

/// Why the ingestor refused an event
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Timestamp earlier than the last accepted event
    OutOfOrder { timestamp: f64, last: f64 },
    /// Payload missing or not finite for the event kind
    Malformed(SchemaError),
}

/// Monotonic gate in front of the analyzers
#[derive(Debug, Clone, Default)]
pub struct EventIngestor {
    last_timestamp: Option<f64>,
}

impl EventIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the last accepted event
    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Validate and type one raw event
    pub fn ingest(&mut self, raw: &RawEvent) -> Result<TimedEvent, Rejection> {
        raw.validate().map_err(Rejection::Malformed)?;

        if let Some(last) = self.last_timestamp {
            if raw.timestamp < last {
                return Err(Rejection::OutOfOrder {
                    timestamp: raw.timestamp,
                    last,
                });
            }
        }

        let event = to_input_event(raw)?;
        self.last_timestamp = Some(raw.timestamp);

        Ok(TimedEvent {
            timestamp: raw.timestamp,
            event,
        })
    }
}

fn to_input_event(raw: &RawEvent) -> Result<InputEvent, Rejection> {
    let missing = |field: &'static str| {
        Rejection::Malformed(SchemaError::MissingField {
            kind: raw.kind.as_str(),
            field,
        })
    };

    let event = match raw.kind {
        EventKind::PointerMove => InputEvent::PointerMove {
            x: raw.x.ok_or_else(|| missing("x"))?,
            y: raw.y.ok_or_else(|| missing("y"))?,
        },
        EventKind::Click => InputEvent::Click,
        EventKind::KeyDown => InputEvent::KeyDown {
            code: raw.code.clone().ok_or_else(|| missing("code"))?,
            key: raw.key.clone().unwrap_or_default(),
        },
        EventKind::KeyUp => InputEvent::KeyUp {
            code: raw.code.clone().ok_or_else(|| missing("code"))?,
            key: raw.key.clone().unwrap_or_default(),
        },
        EventKind::Scroll => InputEvent::Scroll {
            offset: raw.scroll_offset.ok_or_else(|| missing("scrollOffset"))?,
        },
        EventKind::FocusIn => InputEvent::FocusIn {
            editable: is_editable_target(&raw.target()),
        },
        EventKind::FocusOut => InputEvent::FocusOut {
            editable: is_editable_target(&raw.target()),
        },
    };
    Ok(event)
}
