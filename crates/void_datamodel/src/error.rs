//! Error types for the data model

use std::path::PathBuf;

use thiserror::Error;
use void_core::ObjectId;
use void_ir::{DocumentError, MigrationError};
use void_reflection::ValueError;

/// A single context operation was rejected; nothing was changed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    #[error("Invalid handle '{0}'")]
    InvalidHandle(String),

    #[error("Object '{0}' does not exist")]
    NoSuchObject(ObjectId),

    #[error("Unknown object type '{0}'")]
    UnknownType(String),

    #[error("Object id '{0}' already in use")]
    DuplicateId(ObjectId),

    #[error("Property '{0}' is read-only")]
    ReadOnly(String),

    #[error("Link from '{start}' to '{end}' would create a loop")]
    LinkLoop { start: String, end: String },

    #[error("Link from '{start}' to '{end}' not allowed: {reason}")]
    LinkNotAllowed {
        start: String,
        end: String,
        reason: String,
    },

    #[error("Cannot move '{0}' below itself")]
    SceneGraphLoop(ObjectId),

    #[error("Invalid value: {0}")]
    Value(#[from] ValueError),

    #[error(transparent)]
    ExternalReference(#[from] ExtrefError),

    #[error("Clipboard data rejected: {0}")]
    Clipboard(String),
}

/// External project mapping and resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtrefError {
    #[error("External project with empty id not allowed.")]
    EmptyProjectId,

    #[error("External reference project loop detected (based on project ID).")]
    LoopById,

    #[error("External reference project loop detected (based on project path).")]
    LoopByPath,

    #[error("Duplicate external project name with different file paths.")]
    DuplicatePath,

    #[error("Project ID change for file '{path}' detected: '{old}' renamed to '{new}'")]
    ProjectIdChanged { path: String, old: String, new: String },

    #[error("External project '{0}' is not mapped")]
    UnknownProject(String),

    #[error("Failed to load external project '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Object '{object}' not found in external project '{project}'")]
    MissingObject { project: String, object: ObjectId },
}

/// Loading a project failed; nothing was loaded
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file extension for {path:?}, expected '.{expected}'")]
    Extension { path: PathBuf, expected: String },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    ExternalReference(#[from] ExtrefError),
}

/// Saving a project failed
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file extension for {path:?}, expected '.{expected}'")]
    Extension { path: PathBuf, expected: String },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Undo(#[from] UndoError),
}

/// Undo stack navigation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UndoError {
    #[error("Undo index {index} out of range (stack size {size})")]
    IndexOutOfRange { index: usize, size: usize },
}

/// Configuration file could not be read
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ContextError>;
