//! Engine configuration
//!
//! Every tunable constant of the analyzers lives here so hosts can adjust
//! them per deployment. Defaults suit a desktop browser collector.

use crate::error::InteractionError;
use serde::{Deserialize, Serialize};

/// Reference pointer DPI used to derive the normalization factor
pub const DEFAULT_TARGET_DPI: f64 = 1600.0;

/// DPI the normalization factor is expressed against
pub const BASE_DPI: f64 = 800.0;

/// Bound on a single acceleration sample (px/s²)
pub const DEFAULT_ACCELERATION_CAP: f64 = 50_000.0;

/// Motion window capacity (samples)
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// Identifier used when the host supplies a blank user id
pub const ANONYMOUS_USER_ID: &str = "anonymous-user";

/// Tunables for a single tracking session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pointer DPI the raw deltas are normalized towards (factor = dpi / 800)
    pub target_dpi: f64,
    /// Number of accepted motion samples kept for running averages
    pub window_capacity: usize,
    /// Symmetric clamp applied to each acceleration sample
    pub acceleration_cap: f64,
    /// Samples with an elapsed time at or above this are sensor gaps
    pub max_sample_gap_sec: f64,
    /// Minimum spacing between processed pointer-move events
    pub sample_interval_ms: f64,
    /// Jitter threshold as a fraction of the average speed
    pub jitter_fraction: f64,
    /// Jitter threshold used while the average speed is still zero
    pub jitter_floor: f64,
    /// Period of the idle polling tick
    pub idle_tick_ms: f64,
    /// Inactivity gap that counts as idle when seen by a tick
    pub idle_threshold_ms: f64,
    /// Key names counted as typing corrections
    pub deletion_keys: Vec<String>,
    /// Fallback user id for blank identifiers
    pub anonymous_user_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_dpi: DEFAULT_TARGET_DPI,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            acceleration_cap: DEFAULT_ACCELERATION_CAP,
            max_sample_gap_sec: 5.0,
            sample_interval_ms: 100.0,
            jitter_fraction: 0.05,
            jitter_floor: 0.5,
            idle_tick_ms: 5_000.0,
            idle_threshold_ms: 1_000.0,
            deletion_keys: vec!["Backspace".to_string(), "Delete".to_string()],
            anonymous_user_id: ANONYMOUS_USER_ID.to_string(),
        }
    }
}

impl EngineConfig {
    /// Scale applied to raw pixel deltas before distance computation
    pub fn normalization_factor(&self) -> f64 {
        self.target_dpi / BASE_DPI
    }

    /// Load and validate a configuration from JSON.
    ///
    /// Missing keys take their default value.
    pub fn from_json(json: &str) -> Result<Self, InteractionError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check that every tunable is usable
    pub fn validate(&self) -> Result<(), InteractionError> {
        let positive = [
            ("target_dpi", self.target_dpi),
            ("acceleration_cap", self.acceleration_cap),
            ("max_sample_gap_sec", self.max_sample_gap_sec),
            ("idle_tick_ms", self.idle_tick_ms),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(InteractionError::Config(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }

        let non_negative = [
            ("sample_interval_ms", self.sample_interval_ms),
            ("jitter_fraction", self.jitter_fraction),
            ("jitter_floor", self.jitter_floor),
            ("idle_threshold_ms", self.idle_threshold_ms),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(InteractionError::Config(format!(
                    "{name} must be a non-negative finite number, got {value}"
                )));
            }
        }

        if self.window_capacity == 0 {
            return Err(InteractionError::Config(
                "window_capacity must be at least 1".to_string(),
            ));
        }

        if self.anonymous_user_id.trim().is_empty() {
            return Err(InteractionError::Config(
                "anonymous_user_id must not be blank".to_string(),
            ));
        }

        Ok(())
    }
}
