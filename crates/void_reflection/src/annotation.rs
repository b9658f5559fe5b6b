//! Annotations attached to values and objects
//!
//! Annotations are small tagged records that travel with a value through
//! clone and serialization: range bounds, display names, link capability,
//! UI flags, and the external-reference marker on objects.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Which link directions a property supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkCapability {
    /// Property may be the start of a link (an output)
    Start,
    /// Property may be the end of a link (an input)
    End,
    /// Both directions
    StartAndEnd,
}

impl LinkCapability {
    /// Check whether a link may start here
    pub fn can_start(self) -> bool {
        matches!(self, Self::Start | Self::StartAndEnd)
    }

    /// Check whether a link may end here
    pub fn can_end(self) -> bool {
        matches!(self, Self::End | Self::StartAndEnd)
    }
}

/// Discriminant of an [`Annotation`], used for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnnotationKind {
    RangeInt,
    RangeDouble,
    DisplayName,
    Link,
    Hidden,
    ExpectEmptyReference,
    ReadOnly,
    Uri,
    Enumeration,
    ExternalReference,
}

/// A tagged annotation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typeName", content = "properties")]
pub enum Annotation {
    /// Inclusive UI range for integer values
    RangeInt { min: i32, max: i32 },
    /// Inclusive UI range for floating point values
    RangeDouble { min: f64, max: f64 },
    /// Human-readable name shown instead of the property name
    DisplayName { name: String },
    /// Link direction capability
    Link { capability: LinkCapability },
    /// Hidden from the property browser
    Hidden,
    /// Reference that is expected to stay empty, so no error is reported
    ExpectEmptyReference,
    /// Not editable through the UI
    ReadOnly,
    /// String holds a file URI, with an open-dialog filter
    Uri { filter: String },
    /// Integer holds a value of the named enumeration
    Enumeration { name: String },
    /// Object was imported from another project
    ExternalReference { project_id: String },
}

impl Annotation {
    /// Get the annotation kind
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Self::RangeInt { .. } => AnnotationKind::RangeInt,
            Self::RangeDouble { .. } => AnnotationKind::RangeDouble,
            Self::DisplayName { .. } => AnnotationKind::DisplayName,
            Self::Link { .. } => AnnotationKind::Link,
            Self::Hidden => AnnotationKind::Hidden,
            Self::ExpectEmptyReference => AnnotationKind::ExpectEmptyReference,
            Self::ReadOnly => AnnotationKind::ReadOnly,
            Self::Uri { .. } => AnnotationKind::Uri,
            Self::Enumeration { .. } => AnnotationKind::Enumeration,
            Self::ExternalReference { .. } => AnnotationKind::ExternalReference,
        }
    }

    /// Shorthand for an input link annotation
    pub fn link_end() -> Self {
        Self::Link {
            capability: LinkCapability::End,
        }
    }

    /// Shorthand for an output link annotation
    pub fn link_start() -> Self {
        Self::Link {
            capability: LinkCapability::Start,
        }
    }

    /// Shorthand for a property linkable in both directions
    pub fn link_start_and_end() -> Self {
        Self::Link {
            capability: LinkCapability::StartAndEnd,
        }
    }

    /// Shorthand for a display name annotation
    pub fn display_name(name: impl Into<String>) -> Self {
        Self::DisplayName { name: name.into() }
    }

    /// Reflect the annotation's fields as named values
    pub fn fields(&self) -> Vec<(&'static str, Value)> {
        match self {
            Self::RangeInt { min, max } => vec![("min", Value::Int(*min)), ("max", Value::Int(*max))],
            Self::RangeDouble { min, max } => {
                vec![("min", Value::Double(*min)), ("max", Value::Double(*max))]
            }
            Self::DisplayName { name } => vec![("name", Value::String(name.clone()))],
            Self::Link { capability } => vec![
                ("start", Value::Bool(capability.can_start())),
                ("end", Value::Bool(capability.can_end())),
            ],
            Self::Uri { filter } => vec![("filter", Value::String(filter.clone()))],
            Self::Enumeration { name } => vec![("name", Value::String(name.clone()))],
            Self::ExternalReference { project_id } => {
                vec![("projectID", Value::String(project_id.clone()))]
            }
            Self::Hidden | Self::ExpectEmptyReference | Self::ReadOnly => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_serde_shape() {
        let json = serde_json::to_value(Annotation::RangeInt { min: 0, max: 10 }).unwrap();
        assert_eq!(json["typeName"], "RangeInt");
        assert_eq!(json["properties"]["max"], 10);

        let hidden: Annotation = serde_json::from_str(r#"{"typeName":"Hidden"}"#).unwrap();
        assert_eq!(hidden, Annotation::Hidden);
    }

    #[test]
    fn test_reflected_fields() {
        let fields = Annotation::link_end().fields();
        assert_eq!(fields[0], ("start", Value::Bool(false)));
        assert_eq!(fields[1], ("end", Value::Bool(true)));
        assert!(Annotation::Hidden.fields().is_empty());
    }
}
