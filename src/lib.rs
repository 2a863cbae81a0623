//! Synheart Interaction - Real-time behavioral interaction metrics
//!
//! Interaction turns a live stream of raw input-device events from one user
//! session into a single feature vector through a deterministic pipeline:
//! ordered ingestion → motion, keystroke and attention analysis → session-end
//! aggregation and validation → output sink.
//!
//! ## Modules
//!
//! - **Session**: Live tracking of one session (`Session`), driven event by event
//! - **Pipeline**: Replay of recorded event streams (`ReplayProcessor`)
//! - **Sink**: Delivery of finished vectors (CSV table, NDJSON records)

pub mod aggregator;
pub mod attention;
pub mod config;
pub mod encoder;
pub mod error;
pub mod ingest;
pub mod keystroke;
pub mod motion;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod sink;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::EngineConfig;
pub use error::{InteractionError, TransmitError, ValidationError};
pub use pipeline::{events_to_features, ReplayProcessor, ReplayReport};
pub use session::Session;
pub use sink::{parse_table, serialize, OutputSink};
pub use types::{Diagnostics, FeatureVector};

// Schema exports
pub use schema::{RawEvent, RawEventAdapter, SCHEMA_VERSION};

/// Library version embedded in all encoded records
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for encoded records
pub const PRODUCER_NAME: &str = "synheart-interaction";
