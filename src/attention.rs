//! Attention tracking
//!
//! Click and scroll counters, per-field dwell time, and polled idle time.
//! Focus changes also decide whether key events are routed to keystroke
//! analysis.

use crate::config::EngineConfig;
use crate::keystroke::mean;
use crate::schema::EventTarget;
use serde::{Deserialize, Serialize};

/// Element tags that accept typed text
const EDITABLE_TAGS: [&str; 2] = ["INPUT", "TEXTAREA"];

/// Whether key events on `target` belong to typing analysis.
///
/// An explicit host decision wins; otherwise text inputs, text areas and
/// content-editable elements are editable.
pub fn is_editable_target(target: &EventTarget) -> bool {
    if let Some(editable) = target.editable {
        return editable;
    }
    target.content_editable
        || target
            .tag
            .as_deref()
            .is_some_and(|tag| EDITABLE_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag)))
}

/// Session-end attention statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttentionSummary {
    pub click_count: u64,
    /// Cumulative scroll distance (px)
    pub scroll_distance: f64,
    /// Cumulative idle time (s)
    pub idle_time_sec: f64,
    /// Mean dwell time over closed focus spans (ms)
    pub average_dwell_time: f64,
    pub dwell_samples: usize,
}

/// Attention accumulator for one session
#[derive(Debug, Clone)]
pub struct AttentionTracker {
    idle_threshold_ms: f64,
    click_count: u64,
    scroll_distance: f64,
    last_scroll_offset: f64,
    idle_time_sec: f64,
    last_activity: f64,
    focus_started: Option<f64>,
    dwell_times: Vec<f64>,
    keys_attached: bool,
}

impl AttentionTracker {
    /// Start tracking at `started_at` with the page's initial scroll offset
    pub fn new(config: &EngineConfig, started_at: f64, initial_scroll_offset: f64) -> Self {
        Self {
            idle_threshold_ms: config.idle_threshold_ms,
            click_count: 0,
            scroll_distance: 0.0,
            last_scroll_offset: initial_scroll_offset,
            idle_time_sec: 0.0,
            last_activity: started_at,
            focus_started: None,
            dwell_times: Vec::new(),
            keys_attached: false,
        }
    }

    /// Record user activity at `timestamp`
    pub fn mark_activity(&mut self, timestamp: f64) {
        self.last_activity = timestamp;
    }

    pub fn on_click(&mut self, timestamp: f64) {
        self.click_count += 1;
        self.mark_activity(timestamp);
    }

    /// Accumulate scroll distance; returns the absolute delta
    pub fn on_scroll(&mut self, timestamp: f64, offset: f64) -> f64 {
        let delta = (offset - self.last_scroll_offset).abs();
        if delta > 0.0 {
            self.scroll_distance += delta;
            self.mark_activity(timestamp);
        }
        self.last_scroll_offset = offset;
        delta
    }

    /// Open a focus span on an editable element and attach key routing.
    ///
    /// Returns whether key routing is attached afterwards.
    pub fn on_focus_in(&mut self, timestamp: f64, editable: bool) -> bool {
        if editable {
            self.focus_started = Some(timestamp);
            self.keys_attached = true;
        }
        self.keys_attached
    }

    /// Close the open focus span, if any; returns the recorded dwell time
    pub fn on_focus_out(&mut self, timestamp: f64, editable: bool) -> Option<f64> {
        let dwell = self.focus_started.take().map(|start| {
            let dwell = timestamp - start;
            self.dwell_times.push(dwell);
            dwell
        });
        if editable {
            self.keys_attached = false;
        }
        dwell
    }

    /// Periodic idle poll; returns the idle seconds added by this tick
    pub fn on_tick(&mut self, now: f64) -> f64 {
        let gap_ms = now - self.last_activity;
        if gap_ms > self.idle_threshold_ms {
            let gap_sec = gap_ms / 1000.0;
            self.idle_time_sec += gap_sec;
            self.last_activity = now;
            return gap_sec;
        }
        0.0
    }

    /// Apply `count` polls at `first`, `first + period`, ... in one step.
    ///
    /// Same result as calling [`on_tick`](Self::on_tick) for each poll with
    /// no activity in between. Returns the idle seconds added.
    pub fn on_ticks(&mut self, first: f64, period: f64, count: u64) -> f64 {
        if count == 0 || period.is_nan() || period <= 0.0 {
            return 0.0;
        }

        // First poll that sees a gap over the threshold
        let gap = first - self.last_activity;
        let skipped = if gap > self.idle_threshold_ms {
            0
        } else {
            ((self.idle_threshold_ms - gap) / period).floor() as u64 + 1
        };
        if skipped >= count {
            return 0.0;
        }

        // Once the marker sits on a poll, every `stride`-th poll counts again
        let stride = (self.idle_threshold_ms / period).floor().max(0.0) as u64 + 1;
        let repeats = (count - 1 - skipped) / stride;
        let last_counted = first + (skipped + repeats * stride) as f64 * period;

        let gap_sec = (last_counted - self.last_activity) / 1000.0;
        self.idle_time_sec += gap_sec;
        self.last_activity = last_counted;
        gap_sec
    }

    pub fn keys_attached(&self) -> bool {
        self.keys_attached
    }

    pub fn last_activity(&self) -> f64 {
        self.last_activity
    }

    pub fn idle_time_sec(&self) -> f64 {
        self.idle_time_sec
    }

    pub fn dwell_times(&self) -> &[f64] {
        &self.dwell_times
    }

    pub fn summary(&self) -> AttentionSummary {
        AttentionSummary {
            click_count: self.click_count,
            scroll_distance: self.scroll_distance,
            idle_time_sec: self.idle_time_sec,
            average_dwell_time: mean(&self.dwell_times),
            dwell_samples: self.dwell_times.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tracker() -> AttentionTracker {
        AttentionTracker::new(&EngineConfig::default(), 0.0, 0.0)
    }

    #[test]
    fn test_editable_predicate() {
        let input = EventTarget {
            tag: Some("input".to_string()),
            ..EventTarget::default()
        };
        let textarea = EventTarget {
            tag: Some("TEXTAREA".to_string()),
            ..EventTarget::default()
        };
        let div = EventTarget {
            tag: Some("DIV".to_string()),
            ..EventTarget::default()
        };
        let rich = EventTarget {
            tag: Some("DIV".to_string()),
            content_editable: true,
            ..EventTarget::default()
        };
        let forced = EventTarget {
            tag: Some("INPUT".to_string()),
            editable: Some(false),
            ..EventTarget::default()
        };

        assert!(is_editable_target(&input));
        assert!(is_editable_target(&textarea));
        assert!(!is_editable_target(&div));
        assert!(is_editable_target(&rich));
        assert!(!is_editable_target(&forced));
        assert!(!is_editable_target(&EventTarget::default()));
    }

    #[test]
    fn test_scroll_accumulates_absolute_deltas() {
        let mut attention = tracker();
        attention.on_scroll(100.0, 300.0);
        attention.on_scroll(200.0, 100.0);
        attention.on_scroll(300.0, 100.0);
        assert_eq!(attention.summary().scroll_distance, 500.0);
        // Zero delta is not activity
        assert_eq!(attention.last_activity(), 200.0);
    }

    #[test]
    fn test_matched_focus_pairs_record_dwell() {
        let mut attention = tracker();
        assert!(attention.on_focus_in(1_000.0, true));
        assert_eq!(attention.on_focus_out(3_500.0, true), Some(2_500.0));
        assert!(!attention.keys_attached());
        assert_eq!(attention.summary().average_dwell_time, 2_500.0);
    }

    #[test]
    fn test_unmatched_focus_out_changes_nothing() {
        let mut attention = tracker();
        assert_eq!(attention.on_focus_out(500.0, true), None);
        assert_eq!(attention.on_focus_out(600.0, false), None);
        assert!(attention.dwell_times().is_empty());

        // Non-editable focus-in opens no span
        assert!(!attention.on_focus_in(700.0, false));
        assert_eq!(attention.on_focus_out(900.0, false), None);
        assert_eq!(attention.summary(), tracker().summary());
    }

    #[test]
    fn test_idle_tick_adds_whole_gap() {
        let mut attention = tracker();
        attention.on_click(2_000.0);
        // 3 s since last activity
        assert_eq!(attention.on_tick(5_000.0), 3.0);
        // Marker reset to the tick; 0.8 s gap is under threshold
        attention.mark_activity(9_200.0);
        assert_eq!(attention.on_tick(10_000.0), 0.0);
        assert_eq!(attention.idle_time_sec(), 3.0);
    }

    #[test]
    fn test_idle_gap_at_threshold_not_counted() {
        let mut attention = tracker();
        assert_eq!(attention.on_tick(1_000.0), 0.0);
        assert_eq!(attention.on_tick(1_000.5), 1.0005);
    }

    #[test]
    fn test_bulk_ticks_skip_to_last_counted_poll() {
        let mut attention = tracker();
        attention.on_click(1_000.0);
        // Polls at 5 s .. 30 s, each over the 1 s threshold
        assert_eq!(attention.on_ticks(5_000.0, 5_000.0, 6), 29.0);
        assert_eq!(attention.last_activity(), 30_000.0);
    }

    #[test]
    fn test_bulk_ticks_under_threshold_add_nothing() {
        let mut attention = tracker();
        attention.on_click(4_500.0);
        assert_eq!(attention.on_ticks(5_000.0, 5_000.0, 1), 0.0);
        assert_eq!(attention.last_activity(), 4_500.0);
        assert_eq!(attention.on_ticks(5_000.0, 5_000.0, 0), 0.0);
    }

    #[test]
    fn test_bulk_ticks_over_huge_gap() {
        let mut attention = tracker();
        let added = attention.on_ticks(5_000.0, 5_000.0, 200_000_000);
        assert_eq!(added, 1_000_000_000.0);
        assert_eq!(attention.last_activity(), 1e12);
    }

    proptest! {
        #[test]
        fn prop_bulk_ticks_match_single_ticks(
            activity in 0.0f64..20_000.0,
            first in 0.0f64..20_000.0,
            period in 100.0f64..8_000.0,
            threshold in 0.0f64..12_000.0,
            count in 0u64..60,
        ) {
            let config = EngineConfig {
                idle_threshold_ms: threshold,
                ..EngineConfig::default()
            };
            let mut single = AttentionTracker::new(&config, 0.0, 0.0);
            single.on_click(activity);
            let mut bulk = single.clone();

            for k in 0..count {
                single.on_tick(first + k as f64 * period);
            }
            bulk.on_ticks(first, period, count);

            prop_assert!((single.idle_time_sec() - bulk.idle_time_sec()).abs() < 1e-6);
            prop_assert!((single.last_activity() - bulk.last_activity()).abs() < 1e-6);
        }

        #[test]
        fn prop_idle_time_monotonic(
            steps in proptest::collection::vec((0.0f64..8_000.0, any::<bool>()), 1..200)
        ) {
            let mut attention = tracker();
            let mut now = 0.0;
            let mut previous = 0.0;
            for (dt, is_tick) in steps {
                now += dt;
                if is_tick {
                    attention.on_tick(now);
                } else {
                    attention.on_click(now);
                }
                prop_assert!(attention.idle_time_sec() >= previous);
                previous = attention.idle_time_sec();
            }
        }
    }
}
