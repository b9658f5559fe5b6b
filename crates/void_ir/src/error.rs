//! Errors for document decoding and migration

use thiserror::Error;
use void_reflection::ValueError;

/// Structural problems that abort a load before anything is built
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document root is not a JSON object")]
    NotAnObject,

    #[error("Missing or invalid field '{0}'")]
    MissingField(&'static str),

    #[error("File version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Invalid embedded type map: {0}")]
    TypeMap(String),
}

/// A migration step could not process its input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MigrationError {
    #[error("Migration to file version {version} failed on object '{object}': {message}")]
    Step {
        version: u32,
        object: String,
        message: String,
    },

    #[error("File version {found} is newer than the supported version {supported}")]
    FutureVersion { found: u32, supported: u32 },

    #[error("Migration to file version {version} failed: {source}")]
    Value {
        version: u32,
        #[source]
        source: ValueError,
    },
}

impl MigrationError {
    /// Shorthand for a step failure
    pub fn step(version: u32, object: impl ToString, message: impl Into<String>) -> Self {
        Self::Step {
            version,
            object: object.to_string(),
            message: message.into(),
        }
    }
}
