use jsonschema::Validator;
use serde_json::Value;

use crate::error::TrackError;

const TRACK_SCHEMA: &str = include_str!("../resources/track-schema.json");

/// Structural validator for expanded track documents.
pub struct TrackSchema {
    validator: Validator,
}

impl TrackSchema {
    /// Compiles the schema bundled with this crate.
    pub fn bundled() -> Result<Self, TrackError> {
        let schema: Value = serde_json::from_str(TRACK_SCHEMA)?;
        Self::from_value(&schema)
    }

    pub fn from_value(schema: &Value) -> Result<Self, TrackError> {
        let validator = Validator::new(schema)
            .map_err(|err| TrackError::Serialization(format!("invalid track schema: {err}")))?;
        Ok(Self { validator })
    }

    /// Reports the first violation with enough detail to locate it in the document and
    /// in the schema.
    pub fn validate(&self, track_name: &str, document: &Value) -> Result<(), TrackError> {
        self.validator.validate(document).map_err(|err| {
            let instance = serde_json::to_string_pretty(err.instance.as_ref())
                .unwrap_or_else(|_| err.instance.to_string());
            TrackError::SchemaViolation {
                track: track_name.to_string(),
                message: err.to_string(),
                instance,
                path: err.instance_path.to_string(),
                schema_path: err.schema_path.to_string(),
            }
        })
    }
}
