//! Stable object identifiers
//!
//! Every editor object carries a globally unique string id. Freshly created
//! objects get a random UUID; objects produced by restructuring (prefab
//! instance content, split-off objects during migration) get an id derived
//! from two stable inputs so the same document always yields the same ids.

use core::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdError;

/// Namespace used to map non-UUID ids onto UUIDs before derivation.
const NAME_NAMESPACE: Uuid = Uuid::from_u128(0x6ba7b812_9dad_11d1_80b4_00c04fd430c8);

/// A globally unique object identifier
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Create an id from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Deterministic id for a name
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&NAME_NAMESPACE, name.as_bytes()).hyphenated().to_string())
    }

    /// Parse a string that must be a UUID
    pub fn parse_uuid(id: &str) -> Result<Self, IdError> {
        Uuid::parse_str(id)
            .map(|uuid| Self(uuid.hyphenated().to_string()))
            .map_err(|_| IdError::NotAUuid(id.to_string()))
    }

    /// Get the id as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the id is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derive a new id from this id and `other`.
    ///
    /// The two ids are XORed byte-wise as UUIDs, which makes the derivation
    /// reversible: `a.derive(&b).derive(&b) == a` whenever `a` is a UUID.
    /// Non-UUID ids are first mapped through a name-based UUID.
    pub fn derive(&self, other: &ObjectId) -> ObjectId {
        let a = self.to_uuid().as_u128();
        let b = other.to_uuid().as_u128();
        Self(Uuid::from_u128(a ^ b).hyphenated().to_string())
    }

    fn to_uuid(&self) -> Uuid {
        Uuid::parse_str(&self.0).unwrap_or_else(|_| Uuid::new_v5(&NAME_NAMESPACE, self.0.as_bytes()))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the id of the object that mirrors `source` inside `owner`.
///
/// Convenience wrapper over [`ObjectId::derive`] used by prefab instancing
/// and by migration steps that split one object into two.
pub fn derive_object_id(source: &ObjectId, owner: &ObjectId) -> ObjectId {
    source.derive(owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let a = ObjectId::generate();
        let b = ObjectId::generate();
        assert_ne!(a, b);
        assert!(ObjectId::parse_uuid(a.as_str()).is_ok());
    }

    #[test]
    fn test_derive_known_value() {
        let a = ObjectId::new("00000000-0000-0000-0000-0000000000ff");
        let b = ObjectId::new("00000000-0000-0000-0000-000000000001");
        assert_eq!(a.derive(&b).as_str(), "00000000-0000-0000-0000-0000000000fe");
    }

    #[test]
    fn test_derive_is_reversible() {
        let a = ObjectId::generate();
        let b = ObjectId::generate();
        assert_eq!(a.derive(&b).derive(&b), a);
    }

    #[test]
    fn test_derive_non_uuid_is_stable() {
        let a = ObjectId::new("camera");
        let b = ObjectId::new("instance");
        assert_eq!(a.derive(&b), a.derive(&b));
        assert!(ObjectId::parse_uuid(a.derive(&b).as_str()).is_ok());
    }

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(matches!(ObjectId::parse_uuid("nope"), Err(IdError::NotAUuid(_))));
    }
}
