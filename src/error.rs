//! Error types for Synheart Interaction

use thiserror::Error;

/// Errors surfaced to callers of the interaction engine
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("Failed to parse input: {0}")]
    Parse(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transmit(#[from] TransmitError),

    #[error("Session already finalized")]
    AlreadyFinalized,

    #[error("Session has not been finalized")]
    NotFinalized,
}

/// Session-end feature vector failed its range contract.
///
/// Emission is aborted; `fields` names every offending field using the
/// output contract names (e.g. `cursorAcceleration`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Feature vector out of range: {}", fields.join(", "))]
pub struct ValidationError {
    pub fields: Vec<String>,
}

/// Output sink rejected the vector or could not be reached
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransmitError {
    #[error("Sink rejected feature vector: {0}")]
    Rejected(String),

    #[error("Sink unreachable: {0}")]
    Unreachable(String),

    #[error("Sink write failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransmitError {
    fn from(e: std::io::Error) -> Self {
        TransmitError::Io(e.to_string())
    }
}

impl From<csv::Error> for TransmitError {
    fn from(e: csv::Error) -> Self {
        TransmitError::Io(e.to_string())
    }
}
