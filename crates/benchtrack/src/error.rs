use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// High-level error type shared across the track loading pipeline.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("track syntax error: {0}")]
    Syntax(String),
    #[error("could not load '{}': {message}", file.display())]
    Template { file: PathBuf, message: String },
    #[error(
        "Track '{track}' is invalid.\n\nError details: {message}\nInstance: {instance}\nPath: {path}\nSchema path: {schema_path}"
    )]
    SchemaViolation {
        track: String,
        message: String,
        instance: String,
        path: String,
        schema_path: String,
    },
    #[error("setup error: {0}")]
    Setup(String),
    #[error("data error: {0}")]
    Data(String),
    #[error("supply error: {0}")]
    Supply(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for TrackError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl TrackError {
    /// True for every error raised because the track definition itself is malformed.
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            TrackError::Syntax(_) | TrackError::Template { .. } | TrackError::SchemaViolation { .. }
        )
    }

    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            TrackError::Syntax(msg) => TrackError::Syntax(format!("{ctx}: {msg}")),
            TrackError::Template { file, message } => TrackError::Template {
                file,
                message: format!("{ctx}: {message}"),
            },
            TrackError::SchemaViolation { .. } => self,
            TrackError::Setup(msg) => TrackError::Setup(format!("{ctx}: {msg}")),
            TrackError::Data(msg) => TrackError::Data(format!("{ctx}: {msg}")),
            TrackError::Supply(msg) => TrackError::Supply(format!("{ctx}: {msg}")),
            TrackError::Serialization(msg) => TrackError::Serialization(format!("{ctx}: {msg}")),
            TrackError::Io(err) => TrackError::Io(err),
        }
    }
}
