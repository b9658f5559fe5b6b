//! Error types shared across the data model crates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when handling object ids
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("Not a valid UUID: '{0}'")]
    NotAUuid(String),
    #[error("Empty object id")]
    Empty,
}

/// Severity of a per-object error item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorLevel {
    /// Informational, e.g. resource metadata
    Info,
    /// Something changed or looks suspicious but the object is usable
    Warning,
    /// The object is broken until the user fixes it
    Error,
}

/// Category of a per-object error item
///
/// Fatal failures (structural load errors, external reference errors) are
/// returned to the caller as typed errors; everything here is recorded
/// against an object or property and never interrupts the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    General,
    /// Engine collaborator rejected script or shader text
    ParseError,
    /// A migration step changed semantics of the object
    MigrationWarning,
    /// External reference could not be resolved
    ExternalReference,
    /// A referenced file could not be read or decoded
    FileLoad,
    /// A link ending on this property is invalid
    BrokenLink,
    /// Metadata reported by the resource cache
    ResourceInfo,
}

impl ErrorCategory {
    /// Whether items of this category clear themselves on the next edit
    pub fn is_self_clearing(self) -> bool {
        matches!(self, ErrorCategory::MigrationWarning)
    }
}

/// Errors produced by file watchers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("Failed to watch {path}: {reason}")]
    WatchFailed { path: String, reason: String },
    #[error("File watcher unavailable: {0}")]
    Unavailable(String),
}
