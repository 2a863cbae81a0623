//! Session lifecycle
//!
//! A [`Session`] is the single writer for one user's [`SessionState`]. Every
//! raw event and idle tick goes through it in order; finalize is a single
//! irreversible transition after which the state is read once and frozen.

use crate::aggregator::{AggregateInput, SessionAggregator};
use crate::attention::AttentionTracker;
use crate::config::EngineConfig;
use crate::error::{InteractionError, ValidationError};
use crate::ingest::{EventIngestor, Rejection};
use crate::keystroke::KeystrokeAnalyzer;
use crate::motion::{MotionAnalyzer, MotionOutcome};
use crate::schema::RawEvent;
use crate::sink::{serialize, OutputSink};
use crate::types::{Ack, Diagnostics, FeatureVector, InputEvent, TimedEvent};
use tracing::{debug, info};

/// Accumulators owned by one running session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub started_at: f64,
    pub motion: MotionAnalyzer,
    pub keys: KeystrokeAnalyzer,
    pub attention: AttentionTracker,
}

impl SessionState {
    pub fn new(config: &EngineConfig, started_at: f64, initial_scroll_offset: f64) -> Self {
        Self {
            started_at,
            motion: MotionAnalyzer::new(config),
            keys: KeystrokeAnalyzer::new(config),
            attention: AttentionTracker::new(config, started_at, initial_scroll_offset),
        }
    }

    /// Route one ordered event to the analyzers
    fn apply(&mut self, event: &TimedEvent, diagnostics: &mut Diagnostics) {
        let t = event.timestamp;
        match &event.event {
            InputEvent::PointerMove { x, y } => {
                self.attention.mark_activity(t);
                match self.motion.on_pointer_move(t, *x, *y) {
                    MotionOutcome::RateLimited => diagnostics.rate_limited_moves += 1,
                    MotionOutcome::Discarded => {
                        debug!(timestamp = t, "motion sample discarded");
                        diagnostics.discarded_samples += 1;
                    }
                    MotionOutcome::Anchored | MotionOutcome::Accepted(_) => {}
                }
            }
            InputEvent::Click => self.attention.on_click(t),
            InputEvent::Scroll { offset } => {
                self.attention.on_scroll(t, *offset);
            }
            InputEvent::KeyDown { code, .. } => {
                if !self.attention.keys_attached() {
                    diagnostics.unrouted_key_events += 1;
                } else if self.keys.on_key_down(t, code) {
                    self.attention.mark_activity(t);
                }
            }
            InputEvent::KeyUp { code, key } => {
                if self.attention.keys_attached() {
                    self.keys.on_key_up(t, code, key);
                } else {
                    diagnostics.unrouted_key_events += 1;
                }
            }
            InputEvent::FocusIn { editable } => {
                self.attention.on_focus_in(t, *editable);
            }
            InputEvent::FocusOut { editable } => {
                self.attention.on_focus_out(t, *editable);
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Tracking,
    Finalized(Result<FeatureVector, ValidationError>),
}

/// One tracking session, from first listener attach to finalize
#[derive(Debug, Clone)]
pub struct Session {
    user_id: String,
    ingestor: EventIngestor,
    state: SessionState,
    aggregator: SessionAggregator,
    diagnostics: Diagnostics,
    phase: Phase,
}

impl Session {
    /// Start tracking at `started_at` (ms)
    pub fn new(user_id: impl Into<String>, config: &EngineConfig, started_at: f64) -> Self {
        Self::with_scroll_offset(user_id, config, started_at, 0.0)
    }

    /// Start tracking on a page already scrolled to `initial_scroll_offset`
    pub fn with_scroll_offset(
        user_id: impl Into<String>,
        config: &EngineConfig,
        started_at: f64,
        initial_scroll_offset: f64,
    ) -> Self {
        let user_id = user_id.into();
        info!(user_id = %user_id, started_at, "session started");
        Self {
            user_id,
            ingestor: EventIngestor::new(),
            state: SessionState::new(config, started_at, initial_scroll_offset),
            aggregator: SessionAggregator::new(config),
            diagnostics: Diagnostics::default(),
            phase: Phase::Tracking,
        }
    }

    /// Feed one raw event. Returns whether it reached the analyzers.
    ///
    /// Out-of-order, malformed and post-finalize events are dropped and
    /// only counted in [`Diagnostics`].
    pub fn ingest(&mut self, raw: &RawEvent) -> bool {
        if self.is_finalized() {
            debug!(kind = raw.kind.as_str(), timestamp = raw.timestamp, "late event dropped");
            self.diagnostics.late_events += 1;
            return false;
        }

        match self.ingestor.ingest(raw) {
            Ok(event) => {
                self.diagnostics.accepted_events += 1;
                self.state.apply(&event, &mut self.diagnostics);
                true
            }
            Err(Rejection::OutOfOrder { timestamp, last }) => {
                debug!(kind = raw.kind.as_str(), timestamp, last, "out-of-order event dropped");
                self.diagnostics.out_of_order_events += 1;
                false
            }
            Err(Rejection::Malformed(e)) => {
                debug!(kind = raw.kind.as_str(), error = %e, "malformed event dropped");
                self.diagnostics.malformed_events += 1;
                false
            }
        }
    }

    /// Periodic idle poll at `now` (ms). Returns the idle seconds added.
    pub fn tick(&mut self, now: f64) -> f64 {
        if self.is_finalized() {
            return 0.0;
        }
        self.diagnostics.idle_ticks += 1;
        self.state.attention.on_tick(now)
    }

    /// Run `count` idle polls on a fixed period starting at `first` (ms).
    ///
    /// Used when polls are synthesized for a recorded stream; a long gap
    /// costs one step instead of one call per poll.
    pub fn tick_span(&mut self, first: f64, period: f64, count: u64) -> f64 {
        if self.is_finalized() || count == 0 {
            return 0.0;
        }
        self.diagnostics.idle_ticks += count;
        self.state.attention.on_ticks(first, period, count)
    }

    /// Close the session at `ended_at` (ms) and build its feature vector.
    ///
    /// The transition happens even when validation fails; a second call
    /// returns [`InteractionError::AlreadyFinalized`].
    pub fn finalize(&mut self, ended_at: f64) -> Result<FeatureVector, InteractionError> {
        if self.is_finalized() {
            return Err(InteractionError::AlreadyFinalized);
        }

        let session_duration_sec = (ended_at - self.state.started_at) / 1000.0;
        let input = AggregateInput {
            user_id: &self.user_id,
            session_duration_sec,
            motion: self.state.motion.summary(),
            keys: self.state.keys.stats(session_duration_sec),
            attention: self.state.attention.summary(),
        };
        let outcome = self.aggregator.aggregate(&input);

        info!(
            user_id = %self.user_id,
            duration_sec = session_duration_sec,
            valid = outcome.is_ok(),
            accepted = self.diagnostics.accepted_events,
            "session finalized"
        );

        self.phase = Phase::Finalized(outcome.clone());
        outcome.map_err(InteractionError::from)
    }

    /// Hand the retained vector to `sink`. May be called again after a
    /// transmit failure.
    pub fn submit(&self, sink: &mut dyn OutputSink) -> Result<Ack, InteractionError> {
        let vector = self.retained()?;
        Ok(self.aggregator.emit(vector, sink)?)
    }

    /// Retained vector as a two-line delimited table, for local export
    pub fn export_table(&self) -> Result<String, InteractionError> {
        serialize(self.retained()?)
    }

    fn retained(&self) -> Result<&FeatureVector, InteractionError> {
        match &self.phase {
            Phase::Tracking => Err(InteractionError::NotFinalized),
            Phase::Finalized(Ok(vector)) => Ok(vector),
            Phase::Finalized(Err(e)) => Err(InteractionError::Validation(e.clone())),
        }
    }

    /// Finalized vector, if finalize succeeded
    pub fn features(&self) -> Option<&FeatureVector> {
        match &self.phase {
            Phase::Finalized(Ok(vector)) => Some(vector),
            _ => None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.phase, Phase::Finalized(_))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    /// Read-only view of the accumulators
    pub fn state(&self) -> &SessionState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransmitError;
    use pretty_assertions::assert_eq;

    fn session() -> Session {
        Session::new("123412341234", &EngineConfig::default(), 0.0)
    }

    struct FlakySink {
        failures_left: usize,
        delivered: Vec<FeatureVector>,
    }

    impl OutputSink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }

        fn submit(&mut self, vector: &FeatureVector) -> Result<Ack, TransmitError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(TransmitError::Unreachable("offline".to_string()));
            }
            self.delivered.push(vector.clone());
            Ok(Ack {
                sink: "flaky".to_string(),
                reference: None,
            })
        }
    }

    #[test]
    fn test_empty_session_defaults() {
        let mut s = Session::new("", &EngineConfig::default(), 1_000.0);
        let vector = s.finalize(1_000.0).unwrap();
        assert_eq!(vector, FeatureVector::empty("anonymous-user"));
    }

    #[test]
    fn test_detached_key_up_leaves_press_open() {
        let mut s = session();
        s.ingest(&RawEvent::focus_in(0.0, true));
        s.ingest(&RawEvent::key_down(100.0, "KeyA", "a"));
        s.ingest(&RawEvent::focus_out(200.0, true));
        s.ingest(&RawEvent::key_up(300.0, "KeyA", "a"));
        assert_eq!(s.diagnostics().unrouted_key_events, 1);

        // Refocusing lets the next key-up close the press opened at 100
        s.ingest(&RawEvent::focus_in(400.0, true));
        s.ingest(&RawEvent::key_up(500.0, "KeyA", "a"));

        let vector = s.finalize(1_000.0).unwrap();
        assert_eq!(vector.key_press_duration, 400.0);
    }

    #[test]
    fn test_finalize_is_terminal() {
        let mut s = session();
        s.finalize(1_000.0).unwrap();
        assert!(matches!(
            s.finalize(2_000.0),
            Err(InteractionError::AlreadyFinalized)
        ));

        assert!(!s.ingest(&RawEvent::click(1_500.0)));
        assert_eq!(s.tick(10_000.0), 0.0);
        assert_eq!(s.diagnostics().late_events, 1);
        assert_eq!(s.features().map(|v| v.click_pattern), Some(0));
    }

    #[test]
    fn test_keys_only_routed_while_editable_focused() {
        let mut s = session();
        s.ingest(&RawEvent::key_down(10.0, "KeyA", "a"));
        s.ingest(&RawEvent::key_up(60.0, "KeyA", "a"));

        s.ingest(&RawEvent::focus_in(100.0, true));
        s.ingest(&RawEvent::key_down(200.0, "KeyB", "b"));
        s.ingest(&RawEvent::key_up(300.0, "KeyB", "b"));
        s.ingest(&RawEvent::focus_out(400.0, true));

        s.ingest(&RawEvent::key_down(500.0, "KeyC", "c"));

        assert_eq!(s.diagnostics().unrouted_key_events, 3);
        assert_eq!(s.state().keys.durations(), &[100.0]);

        let vector = s.finalize(60_000.0).unwrap();
        assert_eq!(vector.key_press_duration, 100.0);
        assert_eq!(vector.average_dwell_time, 300.0);
        assert_eq!(vector.typing_speed, 1.0);
    }

    #[test]
    fn test_protocol_violations_counted() {
        let mut s = session();
        assert!(s.ingest(&RawEvent::click(100.0)));
        assert!(!s.ingest(&RawEvent::click(50.0)));

        let mut broken = RawEvent::pointer_move(150.0, 0.0, 0.0);
        broken.x = None;
        assert!(!s.ingest(&broken));

        let diagnostics = s.diagnostics();
        assert_eq!(diagnostics.accepted_events, 1);
        assert_eq!(diagnostics.out_of_order_events, 1);
        assert_eq!(diagnostics.malformed_events, 1);
        assert_eq!(s.finalize(200.0).unwrap().click_pattern, 1);
    }

    #[test]
    fn test_pointer_moves_counted_by_outcome() {
        let mut s = session();
        s.ingest(&RawEvent::pointer_move(0.0, 0.0, 0.0));
        s.ingest(&RawEvent::pointer_move(50.0, 5.0, 0.0));
        s.ingest(&RawEvent::pointer_move(100.0, 10.0, 0.0));
        s.ingest(&RawEvent::pointer_move(6_000.0, 20.0, 0.0));

        let diagnostics = s.diagnostics();
        assert_eq!(diagnostics.rate_limited_moves, 1);
        assert_eq!(diagnostics.discarded_samples, 1);

        let vector = s.finalize(6_000.0).unwrap();
        assert_eq!(vector.avg_cursor_speed, 50.0);
    }

    #[test]
    fn test_idle_tick_uses_last_activity() {
        let mut s = session();
        s.ingest(&RawEvent::click(3_000.0));
        assert_eq!(s.tick(5_000.0), 2.0);
        assert_eq!(s.tick(10_000.0), 5.0);
        assert_eq!(s.diagnostics().idle_ticks, 2);
        assert_eq!(s.finalize(10_000.0).unwrap().idle_time, 7.0);
    }

    #[test]
    fn test_submit_requires_finalize() {
        let s = session();
        let mut sink = FlakySink {
            failures_left: 0,
            delivered: Vec::new(),
        };
        assert!(matches!(
            s.submit(&mut sink),
            Err(InteractionError::NotFinalized)
        ));
    }

    #[test]
    fn test_vector_retained_for_retry() {
        let mut s = session();
        s.ingest(&RawEvent::click(10.0));
        s.finalize(1_000.0).unwrap();

        let mut sink = FlakySink {
            failures_left: 1,
            delivered: Vec::new(),
        };
        assert!(matches!(
            s.submit(&mut sink),
            Err(InteractionError::Transmit(TransmitError::Unreachable(_)))
        ));
        s.submit(&mut sink).unwrap();

        assert_eq!(sink.delivered.len(), 1);
        assert_eq!(sink.delivered[0].click_pattern, 1);
        assert!(s.export_table().unwrap().contains("clickPattern"));
    }

    #[test]
    fn test_invalid_vector_not_emitted() {
        let mut s = session();
        // Ends before it started
        let err = s.finalize(-5_000.0).unwrap_err();
        match err {
            InteractionError::Validation(e) => {
                assert_eq!(e.fields, vec!["sessionDuration".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut sink = FlakySink {
            failures_left: 0,
            delivered: Vec::new(),
        };
        assert!(matches!(
            s.submit(&mut sink),
            Err(InteractionError::Validation(_))
        ));
        assert!(sink.delivered.is_empty());
        assert!(s.is_finalized());
    }
}
