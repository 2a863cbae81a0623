//! Feature record encoding
//!
//! Wraps a finished feature vector in a self-describing JSON record with
//! producer metadata, for sinks that ship structured payloads instead of the
//! delimited table.

use crate::error::InteractionError;
use crate::types::{Diagnostics, FeatureVector};
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current record schema version
pub const RECORD_VERSION: &str = "interaction.features.v1";

/// Producer metadata stamped on every record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// One encoded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub record_version: String,
    pub record_id: String,
    pub producer: RecordProducer,
    pub computed_at_utc: String,
    pub features: FeatureVector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

/// Encoder for producing feature records
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    instance_id: String,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, features: &FeatureVector) -> FeatureRecord {
        FeatureRecord {
            record_version: RECORD_VERSION.to_string(),
            record_id: Uuid::new_v4().to_string(),
            producer: RecordProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            features: features.clone(),
            diagnostics: None,
        }
    }

    /// Encode with the session's drop counters attached
    pub fn encode_with_diagnostics(
        &self,
        features: &FeatureVector,
        diagnostics: Diagnostics,
    ) -> FeatureRecord {
        FeatureRecord {
            diagnostics: Some(diagnostics),
            ..self.encode(features)
        }
    }

    /// Encode to a pretty JSON string
    pub fn encode_to_json(&self, features: &FeatureVector) -> Result<String, InteractionError> {
        let record = self.encode(features);
        serde_json::to_string_pretty(&record).map_err(InteractionError::Json)
    }
}
