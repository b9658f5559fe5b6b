//! Change recording
//!
//! Every context mutation is described to two recorders. The undo recorder
//! is drained when a command completes and decides whether an undo entry is
//! pushed. The live recorder is drained by the host once per update tick to
//! refresh views and engine bindings. Both see the same deltas; they differ
//! only in when they are reset.

use std::collections::BTreeSet;

use void_core::ObjectId;

use crate::core::handle::ValueHandle;
use crate::core::link::Link;

/// Semantic deltas accumulated since the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRecorder {
    created: BTreeSet<ObjectId>,
    deleted: BTreeSet<ObjectId>,
    changed_values: BTreeSet<ValueHandle>,
    /// Properties whose children were added or removed
    changed_structure: BTreeSet<ValueHandle>,
    added_links: BTreeSet<ValueHandle>,
    removed_links: BTreeSet<ValueHandle>,
    changed_link_validity: BTreeSet<ValueHandle>,
    errors_changed: BTreeSet<ValueHandle>,
    external_projects_changed: bool,
    code_controlled_changed: bool,
}

impl ChangeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether anything except error items changed. Error list updates alone
    /// do not justify an undo entry.
    pub fn has_model_changes(&self) -> bool {
        !(self.created.is_empty()
            && self.deleted.is_empty()
            && self.changed_values.is_empty()
            && self.changed_structure.is_empty()
            && self.added_links.is_empty()
            && self.removed_links.is_empty()
            && self.changed_link_validity.is_empty()
            && !self.external_projects_changed
            && !self.code_controlled_changed)
    }

    pub fn record_create(&mut self, id: &ObjectId) {
        self.deleted.remove(id);
        self.created.insert(id.clone());
    }

    pub fn record_delete(&mut self, id: &ObjectId) {
        if !self.created.remove(id) {
            self.deleted.insert(id.clone());
        }
        self.changed_values.retain(|h| h.object_id() != id);
        self.changed_structure.retain(|h| h.object_id() != id);
    }

    pub fn record_value_changed(&mut self, handle: &ValueHandle) {
        self.changed_values.insert(handle.clone());
    }

    pub fn record_structure_changed(&mut self, handle: &ValueHandle) {
        self.changed_structure.insert(handle.clone());
    }

    pub fn record_add_link(&mut self, link: &Link) {
        self.removed_links.remove(&link.end);
        self.added_links.insert(link.end.clone());
    }

    pub fn record_remove_link(&mut self, link: &Link) {
        if !self.added_links.remove(&link.end) {
            self.removed_links.insert(link.end.clone());
        }
    }

    pub fn record_link_validity_change(&mut self, link: &Link) {
        self.changed_link_validity.insert(link.end.clone());
    }

    pub fn record_errors_changed(&mut self, handle: &ValueHandle) {
        self.errors_changed.insert(handle.clone());
    }

    pub fn record_external_projects_changed(&mut self) {
        self.external_projects_changed = true;
    }

    pub fn record_code_controlled_changed(&mut self) {
        self.code_controlled_changed = true;
    }

    pub fn created(&self) -> &BTreeSet<ObjectId> {
        &self.created
    }

    pub fn deleted(&self) -> &BTreeSet<ObjectId> {
        &self.deleted
    }

    pub fn changed_values(&self) -> &BTreeSet<ValueHandle> {
        &self.changed_values
    }

    pub fn changed_structure(&self) -> &BTreeSet<ValueHandle> {
        &self.changed_structure
    }

    pub fn added_links(&self) -> &BTreeSet<ValueHandle> {
        &self.added_links
    }

    pub fn removed_links(&self) -> &BTreeSet<ValueHandle> {
        &self.removed_links
    }

    pub fn changed_link_validity(&self) -> &BTreeSet<ValueHandle> {
        &self.changed_link_validity
    }

    pub fn errors_changed(&self) -> &BTreeSet<ValueHandle> {
        &self.errors_changed
    }

    pub fn external_projects_changed(&self) -> bool {
        self.external_projects_changed
    }

    /// Whether `handle` or anything inside or above it changed value
    pub fn has_value_changed(&self, handle: &ValueHandle) -> bool {
        self.changed_values
            .iter()
            .any(|h| h.contains_or_equals(handle) || handle.contains(h))
    }

    /// Objects touched in any way
    pub fn changed_objects(&self) -> BTreeSet<ObjectId> {
        self.changed_values
            .iter()
            .chain(&self.changed_structure)
            .map(|h| h.object_id().clone())
            .chain(self.created.iter().cloned())
            .collect()
    }

    /// Fold another recorder into this one
    pub fn merge(&mut self, other: &ChangeRecorder) {
        for id in &other.created {
            self.record_create(id);
        }
        for id in &other.deleted {
            self.record_delete(id);
        }
        self.changed_values.extend(other.changed_values.iter().cloned());
        self.changed_structure.extend(other.changed_structure.iter().cloned());
        self.added_links.extend(other.added_links.iter().cloned());
        self.removed_links.extend(other.removed_links.iter().cloned());
        self.changed_link_validity.extend(other.changed_link_validity.iter().cloned());
        self.errors_changed.extend(other.errors_changed.iter().cloned());
        self.external_projects_changed |= other.external_projects_changed;
        self.code_controlled_changed |= other.code_controlled_changed;
    }
}

/// The undo and live recorders, fed together
#[derive(Debug, Clone, Default)]
pub struct ChangeRecorders {
    pub undo: ChangeRecorder,
    pub live: ChangeRecorder,
}

macro_rules! forward {
    ($($name:ident($($arg:ident: $ty:ty),*);)*) => {
        $(
            pub fn $name(&mut self, $($arg: $ty),*) {
                self.undo.$name($($arg),*);
                self.live.$name($($arg),*);
            }
        )*
    };
}

impl ChangeRecorders {
    pub fn new() -> Self {
        Self::default()
    }

    forward! {
        record_create(id: &ObjectId);
        record_delete(id: &ObjectId);
        record_value_changed(handle: &ValueHandle);
        record_structure_changed(handle: &ValueHandle);
        record_add_link(link: &Link);
        record_remove_link(link: &Link);
        record_link_validity_change(link: &Link);
        record_errors_changed(handle: &ValueHandle);
        record_external_projects_changed();
        record_code_controlled_changed();
    }

    /// Take the live changes, leaving the live recorder empty
    pub fn take_live(&mut self) -> ChangeRecorder {
        std::mem::take(&mut self.live)
    }

    /// Take the undo changes, leaving the undo recorder empty
    pub fn take_undo(&mut self) -> ChangeRecorder {
        std::mem::take(&mut self.undo)
    }
}
