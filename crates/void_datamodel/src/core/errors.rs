//! Per-object error list
//!
//! Non-fatal findings (parse errors, migration advisories, broken links,
//! resource info) are recorded against a handle and queried by the UI.
//! They never interrupt the session.

use std::collections::BTreeMap;

use void_core::{ErrorCategory, ErrorLevel, ObjectId};

use super::handle::ValueHandle;

/// One recorded finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorItem {
    pub category: ErrorCategory,
    pub level: ErrorLevel,
    pub message: String,
    pub handle: ValueHandle,
}

/// Error items keyed by handle, at most one per handle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errors {
    items: BTreeMap<ValueHandle, ErrorItem>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an item, replacing any previous item on the handle.
    ///
    /// Broken link warnings never replace a parse error. Returns whether
    /// the list changed.
    pub fn add_error(
        &mut self,
        category: ErrorCategory,
        level: ErrorLevel,
        handle: ValueHandle,
        message: impl Into<String>,
    ) -> bool {
        if category == ErrorCategory::BrokenLink
            && self
                .items
                .get(&handle)
                .is_some_and(|e| e.category == ErrorCategory::ParseError)
        {
            return false;
        }
        let item = ErrorItem {
            category,
            level,
            message: message.into(),
            handle: handle.clone(),
        };
        if self.items.get(&handle) == Some(&item) {
            return false;
        }
        self.items.insert(handle, item);
        true
    }

    /// Remove whatever item is recorded on the handle
    pub fn remove_error(&mut self, handle: &ValueHandle) -> bool {
        self.items.remove(handle).is_some()
    }

    /// Remove the item on the handle only if it has the given category
    pub fn remove_error_of(&mut self, handle: &ValueHandle, category: ErrorCategory) -> bool {
        if self.items.get(handle).is_some_and(|e| e.category == category) {
            self.items.remove(handle);
            true
        } else {
            false
        }
    }

    /// Remove self-clearing items recorded against any handle of `object`.
    /// Returns the handles that were cleared.
    pub fn clear_self_clearing(&mut self, object: &ObjectId) -> Vec<ValueHandle> {
        let cleared: Vec<ValueHandle> = self
            .for_object(object)
            .filter(|e| e.category.is_self_clearing())
            .map(|e| e.handle.clone())
            .collect();
        for handle in &cleared {
            self.items.remove(handle);
        }
        cleared
    }

    /// Remove every item recorded on `object` or its properties
    pub fn remove_for_object(&mut self, object: &ObjectId) -> usize {
        let before = self.items.len();
        self.items.retain(|handle, _| handle.object_id() != object);
        before - self.items.len()
    }

    pub fn get_error(&self, handle: &ValueHandle) -> Option<&ErrorItem> {
        self.items.get(handle)
    }

    pub fn has_error(&self, handle: &ValueHandle) -> bool {
        self.items.contains_key(handle)
    }

    /// Items on an object and its properties
    pub fn for_object<'a>(&'a self, object: &'a ObjectId) -> impl Iterator<Item = &'a ErrorItem> + 'a {
        self.items.values().filter(move |e| e.handle.object_id() == object)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorItem> {
        self.items.values()
    }

    /// Highest level recorded on an object and its properties
    pub fn max_level(&self, object: &ObjectId) -> Option<ErrorLevel> {
        self.for_object(object).map(|e| e.level).max()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
