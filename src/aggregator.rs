//! Session-end aggregation
//!
//! Fans in the terminal state of the three analyzers, derives the composite
//! interaction complexity, formats every numeric field to two decimals and
//! validates the result against the output range contract.

use crate::attention::AttentionSummary;
use crate::config::EngineConfig;
use crate::error::{TransmitError, ValidationError};
use crate::keystroke::KeystrokeStats;
use crate::motion::MotionSummary;
use crate::sink::OutputSink;
use crate::types::{Ack, FeatureVector};
use tracing::{info, warn};

/// Terminal analyzer state read once at session end
#[derive(Debug, Clone)]
pub struct AggregateInput<'a> {
    pub user_id: &'a str,
    pub session_duration_sec: f64,
    pub motion: MotionSummary,
    pub keys: KeystrokeStats,
    pub attention: AttentionSummary,
}

/// Builds and emits the session feature vector
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    acceleration_cap: f64,
    anonymous_user_id: String,
}

impl SessionAggregator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            acceleration_cap: config.acceleration_cap,
            anonymous_user_id: config.anonymous_user_id.clone(),
        }
    }

    /// Derive the feature vector, or name every field that breaks its range
    pub fn aggregate(&self, input: &AggregateInput<'_>) -> Result<FeatureVector, ValidationError> {
        let complexity = interaction_complexity(
            input.motion.avg_speed,
            input.motion.avg_acceleration,
            input.motion.path_deviation,
            input.keys.typing_speed,
            input.attention.scroll_distance,
        );

        let user_id = match input.user_id.trim() {
            "" => self.anonymous_user_id.clone(),
            id => id.to_string(),
        };

        let vector = FeatureVector {
            user_id,
            avg_cursor_speed: round2(input.motion.avg_speed),
            cursor_acceleration: round2(input.motion.avg_acceleration),
            path_deviation: round2(input.motion.path_deviation),
            idle_time: round2(input.attention.idle_time_sec),
            jitter: input.motion.jitter,
            click_pattern: input.attention.click_count,
            typing_speed: round2(input.keys.typing_speed),
            key_press_duration: round2(input.keys.avg_press_duration),
            key_transition_time: round2(input.keys.avg_transition_time),
            key_transition_std_dev: round2(input.keys.transition_std_dev),
            typing_accuracy: round2(input.keys.typing_accuracy),
            error_rate: round2(input.keys.error_rate),
            session_duration: round2(input.session_duration_sec),
            average_dwell_time: round2(input.attention.average_dwell_time),
            scroll_behavior: round2(input.attention.scroll_distance),
            interaction_complexity: round2(complexity),
        };

        self.validate(&vector)?;
        Ok(vector)
    }

    /// Check the output range contract
    pub fn validate(&self, vector: &FeatureVector) -> Result<(), ValidationError> {
        let fields: Vec<String> = vector
            .numeric_fields()
            .iter()
            .filter(|(name, value)| !self.in_range(name, *value))
            .map(|(name, _)| name.to_string())
            .collect();

        if fields.is_empty() {
            Ok(())
        } else {
            warn!(fields = ?fields, "feature vector failed validation");
            Err(ValidationError { fields })
        }
    }

    fn in_range(&self, name: &str, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match name {
            "cursorAcceleration" => value.abs() <= self.acceleration_cap,
            "typingAccuracy" | "errorRate" => (0.0..=100.0).contains(&value),
            _ => value >= 0.0,
        }
    }

    /// Hand a validated vector to the sink; failures are returned, not retried
    pub fn emit(
        &self,
        vector: &FeatureVector,
        sink: &mut dyn OutputSink,
    ) -> Result<Ack, TransmitError> {
        match sink.submit(vector) {
            Ok(ack) => {
                info!(sink = %ack.sink, user_id = %vector.user_id, "feature vector submitted");
                Ok(ack)
            }
            Err(e) => {
                warn!(error = %e, "feature vector submission failed");
                Err(e)
            }
        }
    }
}

/// Weighted composite of the derived averages and sums
///
/// ```text
/// complexity = 0.3 * avg_speed
///            + 0.2 * avg_acceleration
///            + 0.2 * path_deviation
///            + 0.2 * typing_speed
///            + 0.1 * scroll_distance
/// ```
pub fn interaction_complexity(
    avg_speed: f64,
    avg_acceleration: f64,
    path_deviation: f64,
    typing_speed: f64,
    scroll_distance: f64,
) -> f64 {
    0.3 * avg_speed
        + 0.2 * avg_acceleration
        + 0.2 * path_deviation
        + 0.2 * typing_speed
        + 0.1 * scroll_distance
}

/// Round to two decimal places, folding negative zero into zero
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
