//! Runtime type descriptors for values

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValueError;

/// The runtime type of a [`Value`](crate::Value).
///
/// Serialized as a compact type string: `Bool`, `Int`, `Int64`, `Double`,
/// `String`, `Ref`, `Table`, `Struct<Name>` and `Array<Element>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Int64,
    Double,
    String,
    Ref,
    Table,
    /// Fixed-layout struct, identified by its schema name
    Struct(String),
    /// Homogeneous array of the element type
    Array(Box<ValueType>),
}

impl ValueType {
    /// Shorthand for a struct type
    pub fn structure(name: impl Into<String>) -> Self {
        Self::Struct(name.into())
    }

    /// Shorthand for an array type
    pub fn array(element: ValueType) -> Self {
        Self::Array(Box::new(element))
    }

    /// Check for struct, table or array
    pub fn has_substructure(&self) -> bool {
        matches!(self, Self::Struct(_) | Self::Table | Self::Array(_))
    }

    /// Check for a scalar type
    pub fn is_primitive(&self) -> bool {
        !self.has_substructure()
    }

    /// Get the struct schema name, if this is a struct type
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Self::Struct(name) => Some(name),
            _ => None,
        }
    }

    /// Get the element type, if this is an array type
    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            Self::Array(element) => Some(element),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("Bool"),
            Self::Int => f.write_str("Int"),
            Self::Int64 => f.write_str("Int64"),
            Self::Double => f.write_str("Double"),
            Self::String => f.write_str("String"),
            Self::Ref => f.write_str("Ref"),
            Self::Table => f.write_str("Table"),
            Self::Struct(name) => write!(f, "Struct<{}>", name),
            Self::Array(element) => write!(f, "Array<{}>", element),
        }
    }
}

impl FromStr for ValueType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidTypeString(s.to_string());
        match s {
            "Bool" => Ok(Self::Bool),
            "Int" => Ok(Self::Int),
            "Int64" => Ok(Self::Int64),
            "Double" => Ok(Self::Double),
            "String" => Ok(Self::String),
            "Ref" => Ok(Self::Ref),
            "Table" => Ok(Self::Table),
            _ => {
                if let Some(inner) = s.strip_prefix("Struct<").and_then(|r| r.strip_suffix('>')) {
                    if inner.is_empty() || inner.contains(['<', '>']) {
                        return Err(invalid());
                    }
                    Ok(Self::Struct(inner.to_string()))
                } else if let Some(inner) = s.strip_prefix("Array<").and_then(|r| r.strip_suffix('>')) {
                    let element = inner.parse::<ValueType>().map_err(|_| invalid())?;
                    Ok(Self::Array(Box::new(element)))
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

impl Serialize for ValueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_string_round_trip() {
        let types = [
            ValueType::Bool,
            ValueType::Int64,
            ValueType::structure("Vec3f"),
            ValueType::array(ValueType::Ref),
            ValueType::array(ValueType::array(ValueType::structure("Vec2i"))),
        ];
        for ty in types {
            assert_eq!(ty.to_string().parse::<ValueType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_invalid_type_strings() {
        for s in ["", "Float", "Struct<>", "Array<Nope>", "Struct<Vec3f"] {
            assert!(s.parse::<ValueType>().is_err(), "{s} should not parse");
        }
    }
}
