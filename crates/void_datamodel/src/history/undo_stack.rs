//! Linear undo/redo history of project snapshots.
//!
//! Each entry holds a full [`ProjectSnapshot`]. Objects are shared through
//! `Arc`, so an entry only owns copies of the objects that changed since
//! the previous one. Per-object error items are derived state and are not
//! part of a snapshot; they are rebuilt by re-running hooks on restore.

use crate::context::mutation::ModelAccess;
use crate::context::Context;
use crate::core::project::ProjectSnapshot;
use crate::error::UndoError;

#[derive(Debug, Clone)]
struct UndoEntry {
    description: String,
    merge_id: Option<String>,
    snapshot: ProjectSnapshot,
}

/// Undo/redo history.
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: Vec<UndoEntry>,
    index: usize,
    /// Maximum number of entries; 0 means unlimited
    limit: usize,
}

impl UndoStack {
    /// Default maximum history size.
    pub const DEFAULT_LIMIT: usize = 100;

    const INITIAL: &'static str = "Initial";

    /// History with a single baseline entry for the context's current state
    pub fn new(context: &Context, limit: usize) -> Self {
        Self {
            entries: vec![UndoEntry {
                description: Self::INITIAL.to_string(),
                merge_id: None,
                snapshot: context.project().snapshot(),
            }],
            index: 0,
            limit,
        }
    }

    /// Capture the context's state as a new entry.
    ///
    /// Nothing is pushed when the undo recorder saw no model changes. Entries
    /// beyond the current index are discarded. If `merge_id` matches the top
    /// entry's merge id, the top entry is replaced instead.
    pub fn push(&mut self, context: &mut Context, description: impl Into<String>, merge_id: Option<String>) {
        let changes = context.recorders_mut().take_undo();
        if !changes.has_model_changes() {
            return;
        }
        self.entries.truncate(self.index + 1);

        let snapshot = context.project().snapshot();
        let description = description.into();
        let merge = self.index > 0
            && merge_id.is_some()
            && self.entries.last().is_some_and(|top| top.merge_id == merge_id);
        if merge {
            if let Some(top) = self.entries.last_mut() {
                top.snapshot = snapshot;
                top.description = description;
            }
            return;
        }

        log::debug!("Undo entry {}: {}", self.entries.len(), description);
        self.entries.push(UndoEntry {
            description,
            merge_id,
            snapshot,
        });
        if self.limit > 0 && self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
        self.index = self.entries.len() - 1;
    }

    /// Restore the state captured at entry `index`.
    ///
    /// The context is only touched if `index` differs from the current
    /// index or `force` is set.
    pub fn set_index(&mut self, context: &mut Context, index: usize, force: bool) -> Result<(), UndoError> {
        let entry = self.entries.get(index).ok_or(UndoError::IndexOutOfRange {
            index,
            size: self.entries.len(),
        })?;
        if index != self.index || force {
            context.restore_snapshot(&entry.snapshot);
            context.recorders_mut().undo.reset();
            self.index = index;
        }
        Ok(())
    }

    /// Step back one entry; returns false at the baseline
    pub fn undo(&mut self, context: &mut Context) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.set_index(context, self.index - 1, false).is_ok()
    }

    /// Step forward one entry; returns false at the top
    pub fn redo(&mut self, context: &mut Context) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.set_index(context, self.index + 1, false).is_ok()
    }

    /// Collapse the history to one baseline entry of the current state
    pub fn reset(&mut self, context: &mut Context) {
        context.recorders_mut().undo.reset();
        *self = Self::new(context, self.limit);
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn description(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.description.as_str())
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Description of the entry [`undo`](Self::undo) would revert
    pub fn undo_description(&self) -> Option<&str> {
        self.can_undo().then(|| self.entries[self.index].description.as_str())
    }

    /// Description of the entry [`redo`](Self::redo) would reapply
    pub fn redo_description(&self) -> Option<&str> {
        self.entries.get(self.index + 1).map(|e| e.description.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handle::ValueHandle;
    use crate::types::ObjectFactory;
    use std::sync::Arc;

    fn context() -> Context {
        Context::new(Arc::new(ObjectFactory::with_default_types()))
    }

    #[test]
    fn test_push_requires_model_changes() {
        let mut ctx = context();
        let mut stack = UndoStack::new(&ctx, UndoStack::DEFAULT_LIMIT);
        stack.push(&mut ctx, "nothing", None);
        assert_eq!(stack.size(), 1);
        assert!(!stack.can_undo());

        ctx.create_object("Node", "a", None).unwrap();
        stack.push(&mut ctx, "Create 'a'", None);
        assert_eq!(stack.size(), 2);
        assert_eq!(stack.undo_description(), Some("Create 'a'"));
    }

    #[test]
    fn test_undo_redo_restores_objects() {
        let mut ctx = context();
        let mut stack = UndoStack::new(&ctx, 0);
        let id = ctx.create_object("Node", "a", None).unwrap();
        stack.push(&mut ctx, "create", None);
        ctx.take_live_changes();

        assert!(stack.undo(&mut ctx));
        assert!(!ctx.project().contains(&id));
        assert!(ctx.take_live_changes().deleted().contains(&id));

        assert!(stack.redo(&mut ctx));
        assert!(ctx.project().contains(&id));
        assert!(!stack.redo(&mut ctx));
    }

    #[test]
    fn test_merge_id_coalesces_edits() {
        let mut ctx = context();
        let mut stack = UndoStack::new(&ctx, 0);
        let id = ctx.create_object("Node", "a", None).unwrap();
        stack.push(&mut ctx, "create", None);

        let handle = ValueHandle::property(id, "visibility");
        for visible in [false, true, false] {
            ctx.set(&handle, visible).unwrap();
            stack.push(&mut ctx, "set visibility", Some("set a.visibility".into()));
        }
        assert_eq!(stack.size(), 3);

        stack.undo(&mut ctx);
        assert_eq!(handle.as_bool(ctx.project()), Some(true));
    }

    #[test]
    fn test_push_discards_redo_entries() {
        let mut ctx = context();
        let mut stack = UndoStack::new(&ctx, 0);
        ctx.create_object("Node", "a", None).unwrap();
        stack.push(&mut ctx, "a", None);
        stack.undo(&mut ctx);
        ctx.create_object("Node", "b", None).unwrap();
        stack.push(&mut ctx, "b", None);
        assert_eq!(stack.size(), 2);
        assert_eq!(stack.description(1), Some("b"));
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut ctx = context();
        let mut stack = UndoStack::new(&ctx, 3);
        for name in ["a", "b", "c", "d"] {
            ctx.create_object("Node", name, None).unwrap();
            stack.push(&mut ctx, name, None);
        }
        assert_eq!(stack.size(), 3);
        assert_eq!(stack.index(), 2);
        assert_eq!(stack.description(0), Some("b"));
    }

    #[test]
    fn test_set_index_out_of_range() {
        let mut ctx = context();
        let mut stack = UndoStack::new(&ctx, 0);
        assert_eq!(
            stack.set_index(&mut ctx, 4, false),
            Err(UndoError::IndexOutOfRange { index: 4, size: 1 })
        );
    }

    #[test]
    fn test_reset_collapses_history() {
        let mut ctx = context();
        let mut stack = UndoStack::new(&ctx, 0);
        let id = ctx.create_object("Node", "a", None).unwrap();
        stack.push(&mut ctx, "a", None);
        stack.reset(&mut ctx);
        assert_eq!(stack.size(), 1);
        assert_eq!(stack.description(0), Some("Initial"));
        assert!(ctx.project().contains(&id));
    }
}
