//! Keystroke dynamics
//!
//! Tracks press durations and key-down to key-down transitions for keys typed
//! into editable fields, plus the number of correction keys released.

use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Session-end typing statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeStats {
    /// Completed keystrokes (matched key-down/key-up pairs)
    pub keystrokes: u64,
    /// Completed keystrokes on correction keys
    pub errors: u64,
    /// Keystrokes per minute of session time
    pub typing_speed: f64,
    /// Mean press duration (ms)
    pub avg_press_duration: f64,
    /// Mean transition time (ms)
    pub avg_transition_time: f64,
    /// Population standard deviation of transition times (ms)
    pub transition_std_dev: f64,
    /// Corrections per keystroke (0-100)
    pub error_rate: f64,
    /// Non-correction keystrokes per keystroke (0-100)
    pub typing_accuracy: f64,
}

/// Keystroke accumulator for one session
#[derive(Debug, Clone)]
pub struct KeystrokeAnalyzer {
    deletion_keys: Vec<String>,
    /// Press start per key code; at most one open record per code
    open_presses: HashMap<String, f64>,
    last_key_down: Option<f64>,
    durations: Vec<f64>,
    transitions: Vec<f64>,
    error_count: u64,
}

impl KeystrokeAnalyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            deletion_keys: config.deletion_keys.clone(),
            open_presses: HashMap::new(),
            last_key_down: None,
            durations: Vec::new(),
            transitions: Vec::new(),
            error_count: 0,
        }
    }

    /// Handle a key-down. Returns false when the code is already held
    /// (auto-repeat), in which case nothing is recorded.
    pub fn on_key_down(&mut self, timestamp: f64, code: &str) -> bool {
        if self.open_presses.contains_key(code) {
            return false;
        }
        self.open_presses.insert(code.to_string(), timestamp);

        if let Some(last) = self.last_key_down {
            self.transitions.push(timestamp - last);
        }
        self.last_key_down = Some(timestamp);
        true
    }

    /// Handle a key-up. Returns the press duration when a press was open.
    pub fn on_key_up(&mut self, timestamp: f64, code: &str, key: &str) -> Option<f64> {
        let started = self.open_presses.remove(code)?;
        let duration = timestamp - started;
        self.durations.push(duration);

        if self.is_deletion(code, key) {
            self.error_count += 1;
        }
        Some(duration)
    }

    fn is_deletion(&self, code: &str, key: &str) -> bool {
        let name = if key.is_empty() { code } else { key };
        self.deletion_keys.iter().any(|k| k == name)
    }

    /// Number of keys currently held down
    pub fn open_presses(&self) -> usize {
        self.open_presses.len()
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn transitions(&self) -> &[f64] {
        &self.transitions
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Derive statistics over the full accumulated lists
    pub fn stats(&self, session_duration_sec: f64) -> KeystrokeStats {
        let keystrokes = self.durations.len() as u64;
        let typing_speed = if session_duration_sec > 0.0 {
            keystrokes as f64 / (session_duration_sec / 60.0)
        } else {
            0.0
        };

        let (error_rate, typing_accuracy) = if keystrokes > 0 {
            let total = keystrokes as f64;
            let errors = self.error_count as f64;
            ((errors / total) * 100.0, ((total - errors) / total) * 100.0)
        } else {
            (0.0, 100.0)
        };

        KeystrokeStats {
            keystrokes,
            errors: self.error_count,
            typing_speed,
            avg_press_duration: mean(&self.durations),
            avg_transition_time: mean(&self.transitions),
            transition_std_dev: population_std_dev(&self.transitions),
            error_rate,
            typing_accuracy,
        }
    }
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 for an empty slice
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> KeystrokeAnalyzer {
        KeystrokeAnalyzer::new(&EngineConfig::default())
    }

    #[test]
    fn test_press_durations_and_accuracy() {
        let mut keys = analyzer();
        keys.on_key_down(0.0, "KeyA");
        keys.on_key_up(100.0, "KeyA", "a");
        keys.on_key_down(200.0, "KeyB");
        keys.on_key_up(350.0, "KeyB", "b");
        keys.on_key_down(400.0, "KeyC");
        keys.on_key_up(520.0, "KeyC", "c");

        let stats = keys.stats(60.0);
        assert_eq!(stats.keystrokes, 3);
        assert!((stats.avg_press_duration - 123.333_333).abs() < 1e-3);
        assert_eq!(stats.error_rate, 0.0);
        assert_eq!(stats.typing_accuracy, 100.0);
        assert!((stats.typing_speed - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_transitions_span_codes() {
        let mut keys = analyzer();
        keys.on_key_down(0.0, "KeyA");
        keys.on_key_down(80.0, "KeyB");
        keys.on_key_up(90.0, "KeyA", "a");
        keys.on_key_up(150.0, "KeyB", "b");
        keys.on_key_down(200.0, "KeyC");

        assert_eq!(keys.transitions(), &[80.0, 120.0]);
        let stats = keys.stats(1.0);
        assert!((stats.avg_transition_time - 100.0).abs() < 1e-9);
        assert!((stats.transition_std_dev - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_repeat_key_down_ignored_until_release() {
        let mut keys = analyzer();
        assert!(keys.on_key_down(0.0, "KeyA"));
        assert!(!keys.on_key_down(30.0, "KeyA"));
        assert!(!keys.on_key_down(60.0, "KeyA"));
        assert_eq!(keys.on_key_up(100.0, "KeyA", "a"), Some(100.0));
        assert!(keys.transitions().is_empty());
        assert_eq!(keys.open_presses(), 0);
    }

    #[test]
    fn test_unmatched_key_up_records_nothing() {
        let mut keys = analyzer();
        assert_eq!(keys.on_key_up(10.0, "KeyZ", "z"), None);
        assert!(keys.durations().is_empty());
    }

    #[test]
    fn test_deletion_keys_count_as_errors() {
        let mut keys = analyzer();
        keys.on_key_down(0.0, "KeyA");
        keys.on_key_up(50.0, "KeyA", "a");
        keys.on_key_down(100.0, "Backspace");
        keys.on_key_up(150.0, "Backspace", "Backspace");
        keys.on_key_down(200.0, "Delete");
        keys.on_key_up(240.0, "Delete", "");
        keys.on_key_down(300.0, "KeyB");
        keys.on_key_up(350.0, "KeyB", "b");

        let stats = keys.stats(10.0);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.error_rate, 50.0);
        assert_eq!(stats.typing_accuracy, 50.0);
    }

    #[test]
    fn test_empty_defaults() {
        let stats = analyzer().stats(0.0);
        assert_eq!(stats.typing_speed, 0.0);
        assert_eq!(stats.avg_press_duration, 0.0);
        assert_eq!(stats.transition_std_dev, 0.0);
        assert_eq!(stats.error_rate, 0.0);
        assert_eq!(stats.typing_accuracy, 100.0);
    }
}
