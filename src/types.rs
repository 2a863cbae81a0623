//! Core data types for Synheart Interaction
//!
//! These types flow from the ingestor through the analyzers to the final
//! feature vector handed to an output sink.

use serde::{Deserialize, Serialize};

/// Typed, validated input event produced by the ingestor
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMove { x: f64, y: f64 },
    Click,
    KeyDown { code: String, key: String },
    KeyUp { code: String, key: String },
    Scroll { offset: f64 },
    FocusIn { editable: bool },
    FocusOut { editable: bool },
}

/// An input event with its monotonic timestamp (ms)
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub timestamp: f64,
    pub event: InputEvent,
}

/// One accepted motion sample held in the motion window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Normalized speed (px/s)
    pub speed: f64,
    /// Clamped acceleration (px/s²)
    pub acceleration: f64,
    /// Timestamp of the sample (ms)
    pub timestamp: f64,
}

/// Per-session counters of events that never reached the feature vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Events accepted by the ingestor and routed to analyzers
    pub accepted_events: u64,
    /// Events dropped for a timestamp earlier than the previous event
    pub out_of_order_events: u64,
    /// Events dropped for a missing or non-finite payload
    pub malformed_events: u64,
    /// Events that arrived after finalize
    pub late_events: u64,
    /// Pointer moves dropped by the sampling rate limiter
    pub rate_limited_moves: u64,
    /// Motion samples discarded for an out-of-range elapsed time
    pub discarded_samples: u64,
    /// Key events dropped because no editable element had focus
    pub unrouted_key_events: u64,
    /// Idle polling ticks observed
    pub idle_ticks: u64,
}

/// Acknowledgement returned by an output sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Name of the sink that accepted the vector
    pub sink: String,
    /// Sink-specific reference (file path, record id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Output field names, in table column order
pub const FEATURE_FIELDS: [&str; 17] = [
    "userId",
    "avgCursorSpeed",
    "cursorAcceleration",
    "pathDeviation",
    "idleTime",
    "jitter",
    "clickPattern",
    "typingSpeed",
    "keyPressDuration",
    "keyTransitionTime",
    "keyTransitionStdDev",
    "typingAccuracy",
    "errorRate",
    "sessionDuration",
    "averageDwellTime",
    "scrollBehavior",
    "interactionComplexity",
];

/// Immutable session-end feature vector consumed by an external classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    /// User identifier
    pub user_id: String,
    /// Mean speed over the motion window (px/s)
    pub avg_cursor_speed: f64,
    /// Mean acceleration over the motion window (px/s², signed)
    pub cursor_acceleration: f64,
    /// Window-weighted path deviation
    pub path_deviation: f64,
    /// Cumulative idle time (s)
    pub idle_time: f64,
    /// Cumulative jitter movements
    pub jitter: u64,
    /// Click count
    pub click_pattern: u64,
    /// Keystrokes per minute
    pub typing_speed: f64,
    /// Mean key press duration (ms)
    pub key_press_duration: f64,
    /// Mean key-down to key-down time (ms)
    pub key_transition_time: f64,
    /// Population standard deviation of transition times (ms)
    pub key_transition_std_dev: f64,
    /// Share of keystrokes that were not corrections (0-100)
    pub typing_accuracy: f64,
    /// Share of keystrokes that were corrections (0-100)
    pub error_rate: f64,
    /// Session duration (s)
    pub session_duration: f64,
    /// Mean focus dwell time on editable fields (ms)
    pub average_dwell_time: f64,
    /// Cumulative scroll distance (px)
    pub scroll_behavior: f64,
    /// Weighted composite of motion, typing and scroll metrics
    pub interaction_complexity: f64,
}

impl FeatureVector {
    /// Vector with every field at its documented default
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            avg_cursor_speed: 0.0,
            cursor_acceleration: 0.0,
            path_deviation: 0.0,
            idle_time: 0.0,
            jitter: 0,
            click_pattern: 0,
            typing_speed: 0.0,
            key_press_duration: 0.0,
            key_transition_time: 0.0,
            key_transition_std_dev: 0.0,
            typing_accuracy: 100.0,
            error_rate: 0.0,
            session_duration: 0.0,
            average_dwell_time: 0.0,
            scroll_behavior: 0.0,
            interaction_complexity: 0.0,
        }
    }

    /// Numeric fields paired with their output names, in column order
    pub fn numeric_fields(&self) -> [(&'static str, f64); 16] {
        [
            ("avgCursorSpeed", self.avg_cursor_speed),
            ("cursorAcceleration", self.cursor_acceleration),
            ("pathDeviation", self.path_deviation),
            ("idleTime", self.idle_time),
            ("jitter", self.jitter as f64),
            ("clickPattern", self.click_pattern as f64),
            ("typingSpeed", self.typing_speed),
            ("keyPressDuration", self.key_press_duration),
            ("keyTransitionTime", self.key_transition_time),
            ("keyTransitionStdDev", self.key_transition_std_dev),
            ("typingAccuracy", self.typing_accuracy),
            ("errorRate", self.error_rate),
            ("sessionDuration", self.session_duration),
            ("averageDwellTime", self.average_dwell_time),
            ("scrollBehavior", self.scroll_behavior),
            ("interactionComplexity", self.interaction_complexity),
        ]
    }
}
