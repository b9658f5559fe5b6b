//! Value model errors

use thiserror::Error;

use crate::value_type::ValueType;

/// Errors raised by value model operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValueType, found: ValueType },

    #[error("No such property: '{0}'")]
    NoSuchProperty(String),

    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Struct '{0}' has a fixed set of fields")]
    FixedStructure(String),

    #[error("Duplicate property name: '{0}'")]
    DuplicateProperty(String),

    #[error("Value of type {0} has no child properties")]
    NotContainer(ValueType),

    #[error("Invalid type string: '{0}'")]
    InvalidTypeString(String),

    #[error("Unknown struct type: '{0}'")]
    UnknownStruct(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ValueError>;
