//! Replay orchestration
//!
//! Drives a recorded event stream through a [`Session`] the way a live host
//! would: events in order, with the idle poll synthesized on its fixed period
//! between them, then a single finalize.

use crate::config::EngineConfig;
use crate::encoder::FeatureEncoder;
use crate::error::InteractionError;
use crate::schema::{RawEvent, RawEventAdapter};
use crate::session::Session;
use crate::types::{Diagnostics, FeatureVector};
use serde::{Deserialize, Serialize};

/// Replay a JSON array of raw events into a feature vector.
///
/// The session starts at the first event and ends at the last one.
///
/// # Example
/// ```ignore
/// let features = events_to_features(events_json, "123412341234")?;
/// ```
pub fn events_to_features(raw_json: &str, user_id: &str) -> Result<FeatureVector, InteractionError> {
    let events = RawEventAdapter::parse_array(raw_json)?;
    let report = ReplayProcessor::new().replay(&events, user_id)?;
    Ok(report.features)
}

/// Outcome of a successful replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub features: FeatureVector,
    pub diagnostics: Diagnostics,
    pub started_at: f64,
    pub ended_at: f64,
}

/// Stateless driver for recorded sessions.
///
/// Each replay starts from a clean session; nothing carries over between
/// calls.
pub struct ReplayProcessor {
    config: EngineConfig,
    encoder: FeatureEncoder,
    started_at: Option<f64>,
    ended_at: Option<f64>,
}

impl Default for ReplayProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayProcessor {
    /// Create a processor with default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            encoder: FeatureEncoder::new(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Pin the session start instead of using the first event
    pub fn starting_at(mut self, started_at: f64) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Pin the session end instead of using the last event
    pub fn ending_at(mut self, ended_at: f64) -> Self {
        self.ended_at = Some(ended_at);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Feed `events` through a new session without finalizing it.
    ///
    /// Returns the session and the timestamp it should be finalized at.
    pub fn drive(&self, events: &[RawEvent], user_id: &str) -> (Session, f64) {
        let started_at = self
            .started_at
            .or_else(|| first_finite(events))
            .unwrap_or(0.0);
        let mut session = Session::new(user_id, &self.config, started_at);

        let mut ticks = TickSchedule::new(started_at, self.config.idle_tick_ms);
        let mut latest = started_at;

        for event in events {
            if event.timestamp.is_finite() {
                ticks.run_before(&mut session, event.timestamp);
                latest = latest.max(event.timestamp);
            }
            session.ingest(event);
        }

        let ended_at = self.ended_at.unwrap_or(latest);
        ticks.run_through(&mut session, ended_at);

        (session, ended_at)
    }

    /// Replay and finalize
    pub fn replay(&self, events: &[RawEvent], user_id: &str) -> Result<ReplayReport, InteractionError> {
        let (mut session, ended_at) = self.drive(events, user_id);
        let features = session.finalize(ended_at)?;
        Ok(ReplayReport {
            started_at: session.state().started_at,
            ended_at,
            diagnostics: session.diagnostics(),
            features,
        })
    }

    /// Replay and encode the result as a JSON record with diagnostics
    pub fn replay_to_json(&self, events: &[RawEvent], user_id: &str) -> Result<String, InteractionError> {
        let report = self.replay(events, user_id)?;
        let record = self
            .encoder
            .encode_with_diagnostics(&report.features, report.diagnostics);
        serde_json::to_string_pretty(&record).map_err(InteractionError::Json)
    }
}

/// Idle polls at `start + k·period` (k ≥ 1) synthesized for a recorded stream
#[derive(Debug, Clone, Copy)]
pub struct TickSchedule {
    next: f64,
    period: f64,
}

impl TickSchedule {
    pub fn new(started_at: f64, period: f64) -> Self {
        Self {
            next: started_at + period,
            period,
        }
    }

    /// Timestamp of the next pending poll
    pub fn next(&self) -> f64 {
        self.next
    }

    /// Run every pending poll strictly earlier than `timestamp`
    pub fn run_before(&mut self, session: &mut Session, timestamp: f64) -> f64 {
        if timestamp.is_nan() || timestamp <= self.next {
            return 0.0;
        }
        let count = ((timestamp - self.next) / self.period).ceil();
        self.run(session, count)
    }

    /// Run every pending poll at or before `timestamp`
    pub fn run_through(&mut self, session: &mut Session, timestamp: f64) -> f64 {
        if timestamp.is_nan() || timestamp < self.next {
            return 0.0;
        }
        let count = ((timestamp - self.next) / self.period).floor() + 1.0;
        self.run(session, count)
    }

    fn run(&mut self, session: &mut Session, count: f64) -> f64 {
        if self.period.is_nan() || self.period <= 0.0 || !count.is_finite() {
            return 0.0;
        }
        let count = count.max(1.0) as u64;
        let added = session.tick_span(self.next, self.period, count);
        self.next += count as f64 * self.period;
        added
    }
}

fn first_finite(events: &[RawEvent]) -> Option<f64> {
    events
        .iter()
        .map(|e| e.timestamp)
        .find(|t| t.is_finite() && *t >= 0.0)
}
