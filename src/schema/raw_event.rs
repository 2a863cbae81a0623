//! input.raw_event.v1 schema definition
//!
//! Flat, UI-framework-agnostic description of a single input-device event as
//! produced by the host's event layer:
//! - Pointer movement with raw device coordinates
//! - Clicks
//! - Key down / key up with physical code and logical key
//! - Scroll with the new absolute scroll offset
//! - Focus changes with a description of the focused element

use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "input.raw_event.v1";

/// Kind of raw input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    PointerMove,
    Click,
    KeyDown,
    KeyUp,
    Scroll,
    FocusIn,
    FocusOut,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PointerMove => "pointermove",
            EventKind::Click => "click",
            EventKind::KeyDown => "keydown",
            EventKind::KeyUp => "keyup",
            EventKind::Scroll => "scroll",
            EventKind::FocusIn => "focusin",
            EventKind::FocusOut => "focusout",
        }
    }
}

/// Description of the element an event was dispatched to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTarget {
    /// Upper-case element tag (e.g. `INPUT`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Whether the element is content-editable
    #[serde(default)]
    pub content_editable: bool,
    /// Explicit editability decided by the host, overrides tag inspection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
}

/// The main input.raw_event.v1 record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Event kind
    pub kind: EventKind,
    /// Monotonic timestamp in milliseconds
    pub timestamp: f64,
    /// Pointer x coordinate (pointermove)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Pointer y coordinate (pointermove)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Physical key code (keydown/keyup)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Logical key value (keydown/keyup)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// New absolute scroll offset (scroll)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_offset: Option<f64>,
    /// Host-decided editability of the event target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_is_editable: Option<bool>,
    /// Element tag of the event target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_tag: Option<String>,
    /// Whether the event target is content-editable
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub content_editable: bool,
    /// Originating device, used when merging several device streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl RawEvent {
    fn bare(kind: EventKind, timestamp: f64) -> Self {
        RawEvent {
            kind,
            timestamp,
            x: None,
            y: None,
            code: None,
            key: None,
            scroll_offset: None,
            target_is_editable: None,
            target_tag: None,
            content_editable: false,
            device: None,
        }
    }

    /// Create a pointer movement event
    pub fn pointer_move(timestamp: f64, x: f64, y: f64) -> Self {
        RawEvent {
            x: Some(x),
            y: Some(y),
            ..Self::bare(EventKind::PointerMove, timestamp)
        }
    }

    /// Create a click event
    pub fn click(timestamp: f64) -> Self {
        Self::bare(EventKind::Click, timestamp)
    }

    /// Create a key-down event
    pub fn key_down(timestamp: f64, code: impl Into<String>, key: impl Into<String>) -> Self {
        RawEvent {
            code: Some(code.into()),
            key: Some(key.into()),
            ..Self::bare(EventKind::KeyDown, timestamp)
        }
    }

    /// Create a key-up event
    pub fn key_up(timestamp: f64, code: impl Into<String>, key: impl Into<String>) -> Self {
        RawEvent {
            code: Some(code.into()),
            key: Some(key.into()),
            ..Self::bare(EventKind::KeyUp, timestamp)
        }
    }

    /// Create a scroll event carrying the new scroll offset
    pub fn scroll(timestamp: f64, offset: f64) -> Self {
        RawEvent {
            scroll_offset: Some(offset),
            ..Self::bare(EventKind::Scroll, timestamp)
        }
    }

    /// Create a focus-in event for an element with the given editability
    pub fn focus_in(timestamp: f64, editable: bool) -> Self {
        RawEvent {
            target_is_editable: Some(editable),
            ..Self::bare(EventKind::FocusIn, timestamp)
        }
    }

    /// Create a focus-out event for an element with the given editability
    pub fn focus_out(timestamp: f64, editable: bool) -> Self {
        RawEvent {
            target_is_editable: Some(editable),
            ..Self::bare(EventKind::FocusOut, timestamp)
        }
    }

    /// Attach the element tag of the target
    pub fn with_target_tag(mut self, tag: impl Into<String>) -> Self {
        self.target_tag = Some(tag.into());
        self
    }

    /// Tag the originating device
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Target description carried by this event
    pub fn target(&self) -> EventTarget {
        EventTarget {
            tag: self.target_tag.clone(),
            content_editable: self.content_editable,
            editable: self.target_is_editable,
        }
    }

    /// Validate the event schema
    pub fn validate(&self) -> Result<(), SchemaError> {
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return Err(SchemaError::InvalidTimestamp(self.timestamp));
        }

        match self.kind {
            EventKind::PointerMove => {
                let x = self.x.ok_or_else(|| self.missing("x"))?;
                let y = self.y.ok_or_else(|| self.missing("y"))?;
                if !x.is_finite() || !y.is_finite() {
                    return Err(SchemaError::NonFiniteValue {
                        kind: self.kind.as_str(),
                        field: "x/y",
                    });
                }
            }
            EventKind::KeyDown | EventKind::KeyUp => {
                match self.code.as_deref() {
                    Some(code) if !code.is_empty() => {}
                    _ => return Err(self.missing("code")),
                }
            }
            EventKind::Scroll => {
                let offset = self.scroll_offset.ok_or_else(|| self.missing("scrollOffset"))?;
                if !offset.is_finite() {
                    return Err(SchemaError::NonFiniteValue {
                        kind: self.kind.as_str(),
                        field: "scrollOffset",
                    });
                }
            }
            EventKind::Click | EventKind::FocusIn | EventKind::FocusOut => {}
        }

        Ok(())
    }

    fn missing(&self, field: &'static str) -> SchemaError {
        SchemaError::MissingField {
            kind: self.kind.as_str(),
            field,
        }
    }
}

/// Schema errors for raw events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    #[error("Missing field {field} for {kind} event")]
    MissingField { kind: &'static str, field: &'static str },

    #[error("Non-finite {field} for {kind} event")]
    NonFiniteValue { kind: &'static str, field: &'static str },
}
