//! Links between properties

use void_ir::IrLink;

use super::handle::ValueHandle;
use void_core::ObjectId;

/// A directed edge from a start property to an end property
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Link {
    pub start: ValueHandle,
    pub end: ValueHandle,
    /// Cleared when either endpoint stops resolving or the types diverge
    pub valid: bool,
    /// Weak links are ignored by loop detection
    pub weak: bool,
}

impl Link {
    pub fn new(start: ValueHandle, end: ValueHandle) -> Self {
        Self {
            start,
            end,
            valid: true,
            weak: false,
        }
    }

    pub fn weak(start: ValueHandle, end: ValueHandle) -> Self {
        Self {
            weak: true,
            ..Self::new(start, end)
        }
    }

    pub fn with_validity(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn start_object(&self) -> &ObjectId {
        self.start.object_id()
    }

    pub fn end_object(&self) -> &ObjectId {
        self.end.object_id()
    }

    /// Whether either endpoint lies on `object`
    pub fn touches(&self, object: &ObjectId) -> bool {
        self.start_object() == object || self.end_object() == object
    }
}

impl From<&Link> for IrLink {
    fn from(link: &Link) -> Self {
        IrLink {
            start_object: link.start_object().clone(),
            start_path: link.start.path().to_vec(),
            end_object: link.end_object().clone(),
            end_path: link.end.path().to_vec(),
            valid: link.valid,
            weak: link.weak,
        }
    }
}

impl From<&IrLink> for Link {
    fn from(link: &IrLink) -> Self {
        Link {
            start: ValueHandle::new(link.start_object.clone(), link.start_path.clone()),
            end: ValueHandle::new(link.end_object.clone(), link.end_path.clone()),
            valid: link.valid,
            weak: link.weak,
        }
    }
}
