//! Pointer motion analysis
//!
//! Turns rate-limited pointer positions into motion samples held in a bounded
//! FIFO window, and maintains the running speed, acceleration, path deviation
//! and jitter statistics for the session.

use crate::config::EngineConfig;
use crate::types::MotionSample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Drop-not-queue limiter admitting at most one event per interval
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval_ms: f64,
    last_admitted: Option<f64>,
}

impl RateLimiter {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_admitted: None,
        }
    }

    /// Returns true if an event at `now` may be processed.
    ///
    /// Rejected events leave the limiter untouched.
    pub fn admit(&mut self, now: f64) -> bool {
        match self.last_admitted {
            Some(last) if now - last < self.interval_ms => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }
}

/// Fixed-capacity FIFO of the most recent motion samples
#[derive(Debug, Clone)]
pub struct MotionWindow {
    samples: VecDeque<MotionSample>,
    capacity: usize,
}

impl MotionWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one past capacity
    pub fn push(&mut self, sample: MotionSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean_speed(&self) -> f64 {
        self.mean_of(|s| s.speed)
    }

    pub fn mean_acceleration(&self) -> f64 {
        self.mean_of(|s| s.acceleration)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotionSample> {
        self.samples.iter()
    }

    fn mean_of(&self, field: impl Fn(&MotionSample) -> f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(field).sum();
        sum / self.samples.len() as f64
    }
}

/// What happened to a single pointer-move event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionOutcome {
    /// Dropped by the rate limiter; position not updated
    RateLimited,
    /// First position of the session; nothing to measure yet
    Anchored,
    /// Elapsed time out of range; position updated, statistics untouched
    Discarded,
    /// Sample pushed into the window
    Accepted(MotionSample),
}

/// Terminal motion statistics read at session end
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSummary {
    pub avg_speed: f64,
    pub avg_acceleration: f64,
    pub path_deviation: f64,
    pub jitter: u64,
    pub window_len: usize,
}

#[derive(Debug, Clone, Copy)]
struct PointerPosition {
    x: f64,
    y: f64,
    timestamp: f64,
}

/// Running pointer-motion statistics for one session
#[derive(Debug, Clone)]
pub struct MotionAnalyzer {
    normalization_factor: f64,
    acceleration_cap: f64,
    max_gap_sec: f64,
    jitter_fraction: f64,
    jitter_floor: f64,
    limiter: RateLimiter,
    window: MotionWindow,
    last_position: Option<PointerPosition>,
    avg_speed: f64,
    avg_acceleration: f64,
    path_deviation: f64,
    jitter: u64,
}

impl MotionAnalyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            normalization_factor: config.normalization_factor(),
            acceleration_cap: config.acceleration_cap,
            max_gap_sec: config.max_sample_gap_sec,
            jitter_fraction: config.jitter_fraction,
            jitter_floor: config.jitter_floor,
            limiter: RateLimiter::new(config.sample_interval_ms),
            window: MotionWindow::new(config.window_capacity),
            last_position: None,
            avg_speed: 0.0,
            avg_acceleration: 0.0,
            path_deviation: 0.0,
            jitter: 0,
        }
    }

    /// Process one pointer position at `timestamp` (ms)
    pub fn on_pointer_move(&mut self, timestamp: f64, x: f64, y: f64) -> MotionOutcome {
        if !self.limiter.admit(timestamp) {
            return MotionOutcome::RateLimited;
        }

        let current = PointerPosition { x, y, timestamp };
        let Some(previous) = self.last_position.replace(current) else {
            return MotionOutcome::Anchored;
        };

        let raw_dx = x - previous.x;
        let raw_dy = y - previous.y;
        let dx = raw_dx / self.normalization_factor;
        let dy = raw_dy / self.normalization_factor;
        let distance = (dx * dx + dy * dy).sqrt();
        let elapsed = (timestamp - previous.timestamp) / 1000.0;

        // Tab switches and sensor gaps are not motion
        if elapsed <= 0.0 || elapsed >= self.max_gap_sec {
            return MotionOutcome::Discarded;
        }

        let speed = distance / elapsed;
        let acceleration = ((speed - self.avg_speed) / elapsed)
            .clamp(-self.acceleration_cap, self.acceleration_cap);
        let jitter_threshold = self.jitter_threshold();

        let sample = MotionSample {
            speed,
            acceleration,
            timestamp,
        };
        self.window.push(sample);
        self.avg_speed = self.window.mean_speed();
        self.avg_acceleration = self.window.mean_acceleration();

        let straight_line_distance = (raw_dx * raw_dx + raw_dy * raw_dy).sqrt();
        let deviation = (distance - straight_line_distance).abs();
        let weight = self.window.len() as f64;
        self.path_deviation = if self.path_deviation > 0.0 {
            (self.path_deviation * (weight - 1.0) + deviation) / weight
        } else {
            deviation
        };

        if distance < jitter_threshold {
            self.jitter += 1;
        }

        MotionOutcome::Accepted(sample)
    }

    /// Threshold below which a movement counts as jitter, from the average
    /// speed before the current sample is applied
    fn jitter_threshold(&self) -> f64 {
        if self.avg_speed <= f64::EPSILON {
            self.jitter_floor
        } else {
            self.avg_speed * self.jitter_fraction
        }
    }

    pub fn avg_speed(&self) -> f64 {
        self.avg_speed
    }

    pub fn avg_acceleration(&self) -> f64 {
        self.avg_acceleration
    }

    pub fn window(&self) -> &MotionWindow {
        &self.window
    }

    pub fn summary(&self) -> MotionSummary {
        MotionSummary {
            avg_speed: self.avg_speed,
            avg_acceleration: self.avg_acceleration,
            path_deviation: self.path_deviation,
            jitter: self.jitter,
            window_len: self.window.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn analyzer_with_factor(target_dpi: f64) -> MotionAnalyzer {
        MotionAnalyzer::new(&EngineConfig {
            target_dpi,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_speed_uses_normalized_distance() {
        let mut motion = analyzer_with_factor(1600.0);

        assert_eq!(motion.on_pointer_move(0.0, 0.0, 0.0), MotionOutcome::Anchored);
        let outcome = motion.on_pointer_move(100.0, 10.0, 0.0);

        let MotionOutcome::Accepted(sample) = outcome else {
            panic!("expected accepted sample, got {outcome:?}");
        };
        // distance = 10 / 2 = 5 over 0.1 s
        assert!((sample.speed - 50.0).abs() < 1e-9);
        assert!((sample.acceleration - 500.0).abs() < 1e-9);
        assert!((motion.avg_speed() - 50.0).abs() < 1e-9);
        // |5 - 10| against the raw straight line
        assert!((motion.summary().path_deviation - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_limiter_drops_fast_events() {
        let mut motion = analyzer_with_factor(800.0);
        motion.on_pointer_move(0.0, 0.0, 0.0);

        assert_eq!(motion.on_pointer_move(40.0, 5.0, 0.0), MotionOutcome::RateLimited);
        assert_eq!(motion.on_pointer_move(99.0, 6.0, 0.0), MotionOutcome::RateLimited);

        // Dropped events never moved the anchor
        let MotionOutcome::Accepted(sample) = motion.on_pointer_move(100.0, 10.0, 0.0) else {
            panic!("expected accepted sample");
        };
        assert!((sample.speed - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_discards_sample_without_touching_stats() {
        let mut motion = analyzer_with_factor(800.0);
        motion.on_pointer_move(0.0, 0.0, 0.0);
        motion.on_pointer_move(100.0, 10.0, 0.0);
        let before = motion.summary();

        assert_eq!(motion.on_pointer_move(5_100.0, 500.0, 0.0), MotionOutcome::Discarded);
        assert_eq!(motion.summary(), before);

        // The discarded position still anchors the next measurement
        let MotionOutcome::Accepted(sample) = motion.on_pointer_move(5_200.0, 510.0, 0.0) else {
            panic!("expected accepted sample");
        };
        assert!((sample.speed - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_acceleration_is_clamped() {
        let mut motion = analyzer_with_factor(800.0);
        motion.on_pointer_move(0.0, 0.0, 0.0);
        let MotionOutcome::Accepted(sample) = motion.on_pointer_move(100.0, 100_000.0, 0.0) else {
            panic!("expected accepted sample");
        };
        assert_eq!(sample.acceleration, 50_000.0);

        let MotionOutcome::Accepted(sample) = motion.on_pointer_move(200.0, 100_000.0, 0.0) else {
            panic!("expected accepted sample");
        };
        assert_eq!(sample.acceleration, -50_000.0);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = MotionWindow::new(3);
        for i in 0..5 {
            window.push(MotionSample {
                speed: i as f64,
                acceleration: 0.0,
                timestamp: i as f64,
            });
        }
        assert_eq!(window.len(), 3);
        assert!((window.mean_speed() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_jitter_floor_applies_before_any_speed() {
        let mut motion = analyzer_with_factor(800.0);
        motion.on_pointer_move(0.0, 0.0, 0.0);
        // 0.2 px movement with zero average speed falls under the 0.5 floor
        motion.on_pointer_move(100.0, 0.2, 0.0);
        assert_eq!(motion.summary().jitter, 1);

        // Average is now 2 px/s, threshold 0.1 px; a 5 px move is not jitter
        motion.on_pointer_move(200.0, 5.2, 0.0);
        assert_eq!(motion.summary().jitter, 1);
    }

    #[test]
    fn test_jitter_is_cumulative() {
        let mut motion = analyzer_with_factor(800.0);
        motion.on_pointer_move(0.0, 0.0, 0.0);
        motion.on_pointer_move(100.0, 100.0, 0.0);
        // Average 1000 px/s, threshold 50 px
        motion.on_pointer_move(200.0, 101.0, 0.0);
        motion.on_pointer_move(300.0, 102.0, 0.0);
        assert_eq!(motion.summary().jitter, 2);
    }

    #[test]
    fn test_path_deviation_window_weighted() {
        let mut motion = analyzer_with_factor(1600.0);
        motion.on_pointer_move(0.0, 0.0, 0.0);
        motion.on_pointer_move(100.0, 10.0, 0.0); // deviation 5, window 1
        motion.on_pointer_move(200.0, 30.0, 0.0); // deviation 10, window 2
        // (5 * 1 + 10) / 2
        assert!((motion.summary().path_deviation - 7.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_acceleration_within_cap(
            steps in proptest::collection::vec((100.0f64..4_900.0, -5_000.0f64..5_000.0, -5_000.0f64..5_000.0), 1..120)
        ) {
            let mut motion = analyzer_with_factor(1600.0);
            let mut t = 0.0;
            motion.on_pointer_move(t, 0.0, 0.0);
            for (dt, x, y) in steps {
                t += dt;
                if let MotionOutcome::Accepted(sample) = motion.on_pointer_move(t, x, y) {
                    prop_assert!(sample.acceleration.abs() <= 50_000.0);
                }
                prop_assert!(motion.avg_acceleration().abs() <= 50_000.0);
            }
        }

        #[test]
        fn prop_averages_are_mean_of_last_fifty(
            steps in proptest::collection::vec((100.0f64..4_900.0, -800.0f64..800.0, -800.0f64..800.0), 1..150)
        ) {
            let mut motion = analyzer_with_factor(1600.0);
            let mut accepted: Vec<MotionSample> = Vec::new();
            let mut t = 0.0;
            motion.on_pointer_move(t, 0.0, 0.0);
            for (dt, x, y) in steps {
                t += dt;
                if let MotionOutcome::Accepted(sample) = motion.on_pointer_move(t, x, y) {
                    accepted.push(sample);
                }
            }

            let tail = &accepted[accepted.len().saturating_sub(50)..];
            let n = tail.len() as f64;
            let speed = tail.iter().map(|s| s.speed).sum::<f64>() / n;
            let acceleration = tail.iter().map(|s| s.acceleration).sum::<f64>() / n;
            prop_assert!((motion.avg_speed() - speed).abs() <= 1e-6 * speed.abs().max(1.0));
            prop_assert!((motion.avg_acceleration() - acceleration).abs() <= 1e-6 * acceleration.abs().max(1.0));
        }
    }
}
