//! Command layer for undoable edits.
//!
//! Every modification a user makes should go through [`CommandInterface`].
//! A command runs the context operation, brings prefab instances up to
//! date and pushes one undo entry. Consecutive value edits of the same
//! property merge into a single entry.

use std::collections::BTreeMap;
use std::path::Path;

use void_core::ObjectId;
use void_reflection::{Property, Value};

use crate::assets::extref::{add_external_references, update_external_references, ExternalProjectsStore};
use crate::assets::prefab::update_prefab_instances;
use crate::config::DataModelConfig;
use crate::context::{ChangeRecorder, Context};
use crate::core::handle::ValueHandle;
use crate::core::link::Link;
use crate::core::project::Project;
use crate::error::{ContextError, LoadError, Result, SaveError};
use crate::history::UndoStack;
use crate::scene::serializer::{load_project, save_project};

/// A context together with its undo history
#[derive(Debug)]
pub struct CommandInterface {
    context: Context,
    undo: UndoStack,
    externals: ExternalProjectsStore,
    config: DataModelConfig,
}

impl CommandInterface {
    /// Wrap a context; its current state becomes the undo baseline
    pub fn new(mut context: Context, config: DataModelConfig) -> Self {
        update_prefab_instances(&mut context);
        let mut undo = UndoStack::new(&context, config.undo_limit);
        undo.reset(&mut context);
        let externals = ExternalProjectsStore::new(context.factory().clone(), &config);
        Self {
            context,
            undo,
            externals,
            config,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn project(&self) -> &Project {
        self.context.project()
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn config(&self) -> &DataModelConfig {
        &self.config
    }

    /// Changes since the last call, for refreshing live views
    pub fn take_live_changes(&mut self) -> ChangeRecorder {
        self.context.take_live_changes()
    }

    /// Update prefab instances and record an undo entry
    fn finish(&mut self, description: impl Into<String>, merge_id: Option<String>) {
        update_prefab_instances(&mut self.context);
        self.undo.push(&mut self.context, description, merge_id);
    }

    // ---- persistence ---------------------------------------------------

    /// Replace the project with the file at `path`.
    ///
    /// External references are re-synced from their source projects and
    /// prefab instances are updated. The undo history starts over. A
    /// project loop between external projects fails the load and leaves an
    /// empty project.
    pub fn load(&mut self, path: impl AsRef<Path>) -> std::result::Result<(), LoadError> {
        let loaded = load_project(path, self.context.factory(), &self.config)?;
        self.context.adopt_project(loaded.project, &loaded.migration_warnings);

        self.externals = ExternalProjectsStore::new(self.context.factory().clone(), &self.config);
        match update_external_references(&mut self.context, &mut self.externals) {
            Ok(_) => {}
            Err(ContextError::ExternalReference(e)) => {
                log::error!("Load aborted: {}", e);
                self.context.adopt_project(Project::new(), &BTreeMap::new());
                self.undo.reset(&mut self.context);
                return Err(e.into());
            }
            Err(e) => log::error!("External reference update failed: {}", e),
        }
        update_prefab_instances(&mut self.context);
        self.undo.reset(&mut self.context);
        Ok(())
    }

    /// Write the project to `path`, which becomes its current path
    pub fn save(&mut self, path: impl AsRef<Path>) -> std::result::Result<(), SaveError> {
        save_project(&mut self.context, &mut self.undo, path, &self.config)
    }

    // ---- objects -------------------------------------------------------

    /// Create an object, optionally below `parent`
    pub fn create_object(&mut self, kind: &str, name: &str, parent: Option<&ObjectId>) -> Result<ObjectId> {
        if let Some(parent) = parent {
            if !self.context.project().contains(parent) {
                return Err(ContextError::NoSuchObject(parent.clone()));
            }
        }
        let id = self.context.create_object(kind, name, None)?;
        if let Some(parent) = parent {
            self.context.move_scenegraph_child(&id, Some(parent), None)?;
        }
        self.finish(format!("Create '{}' object '{}'", kind, name), None);
        Ok(id)
    }

    /// Delete objects with their descendants
    pub fn delete_objects(&mut self, ids: &[ObjectId]) -> usize {
        let deleted = self.context.delete_objects(ids);
        if deleted > 0 {
            self.finish(format!("Delete {} object(s)", deleted), None);
        }
        deleted
    }

    /// Move objects below `parent`, or to the top level
    pub fn move_scenegraph_children(
        &mut self,
        ids: &[ObjectId],
        parent: Option<&ObjectId>,
        insert_before: Option<usize>,
    ) -> Result<()> {
        for (offset, id) in ids.iter().enumerate() {
            self.context
                .move_scenegraph_child(id, parent, insert_before.map(|i| i + offset))?;
        }
        self.finish(format!("Move {} object(s)", ids.len()), None);
        Ok(())
    }

    pub fn copy_objects(&self, ids: &[ObjectId], deep: bool) -> Result<String> {
        self.context.copy_objects(ids, deep)
    }

    pub fn paste_objects(&mut self, text: &str, parent: Option<&ObjectId>) -> Result<Vec<ObjectId>> {
        let ids = self.context.paste_objects(text, parent)?;
        self.finish(format!("Paste {} object(s)", ids.len()), None);
        Ok(ids)
    }

    // ---- values --------------------------------------------------------

    pub fn set(&mut self, handle: &ValueHandle, value: impl Into<Value>) -> Result<()> {
        self.context.set(handle, value)?;
        let merge_id = format!("set {}", handle);
        self.finish(format!("Set property '{}'", handle), Some(merge_id));
        Ok(())
    }

    pub fn add_property(&mut self, container: &ValueHandle, name: &str, property: Property) -> Result<ValueHandle> {
        let added = self.context.add_property(container, name, property)?;
        self.finish(format!("Add property '{}'", added), None);
        Ok(added)
    }

    pub fn remove_property(&mut self, handle: &ValueHandle) -> Result<Property> {
        let removed = self.context.remove_property(handle)?;
        self.finish(format!("Remove property '{}'", handle), None);
        Ok(removed)
    }

    pub fn resize_array(&mut self, handle: &ValueHandle, len: usize) -> Result<()> {
        self.context.resize_array(handle, len)?;
        self.finish(format!("Resize '{}' to {}", handle, len), None);
        Ok(())
    }

    pub fn set_code_controlled(&mut self, id: &ObjectId, controlled: bool) -> Result<()> {
        self.context.set_code_controlled(id, controlled)?;
        self.finish(format!("Set code control of '{}'", id), None);
        Ok(())
    }

    // ---- links ---------------------------------------------------------

    pub fn add_link(&mut self, start: &ValueHandle, end: &ValueHandle, weak: bool) -> Result<Link> {
        let link = self.context.add_link(start, end, weak)?;
        self.finish(format!("Link '{}' to '{}'", start, end), None);
        Ok(link)
    }

    pub fn remove_link(&mut self, end: &ValueHandle) -> bool {
        let removed = self.context.remove_link(end);
        if removed {
            self.finish(format!("Remove link to '{}'", end), None);
        }
        removed
    }

    // ---- external references -------------------------------------------

    /// Import objects from the project file at `path`
    pub fn add_external_references(&mut self, path: impl AsRef<Path>, ids: &[ObjectId]) -> Result<Vec<ObjectId>> {
        let imported = add_external_references(&mut self.context, &mut self.externals, path.as_ref(), ids)?;
        self.finish(format!("Add {} external reference(s)", imported.len()), None);
        Ok(imported)
    }

    /// Re-read every external project and re-sync the imported objects
    pub fn update_external_references(&mut self) -> Result<usize> {
        self.externals.clear();
        let changed = update_external_references(&mut self.context, &mut self.externals)?;
        self.finish("Update external references", None);
        Ok(changed)
    }

    /// Apply pending file changes from the watcher
    pub fn process_file_changes(&mut self) -> usize {
        let handled = self.context.process_file_changes();
        if handled > 0 {
            self.finish("Reload changed files", None);
        }
        handled
    }

    // ---- history -------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        self.undo.undo(&mut self.context)
    }

    pub fn redo(&mut self) -> bool {
        self.undo.redo(&mut self.context)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo.undo_description()
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.undo.redo_description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectFactory;
    use std::sync::Arc;

    fn commands() -> CommandInterface {
        let context = Context::new(Arc::new(ObjectFactory::with_default_types()));
        CommandInterface::new(context, DataModelConfig::default())
    }

    #[test]
    fn test_each_command_is_one_undo_step() {
        let mut cmd = commands();
        let node = cmd.create_object("Node", "node", None).unwrap();
        assert_eq!(cmd.undo_description(), Some("Create 'Node' object 'node'"));

        cmd.delete_objects(&[node.clone()]);
        assert!(!cmd.project().contains(&node));
        assert!(cmd.undo());
        assert!(cmd.project().contains(&node));
        assert!(cmd.undo());
        assert!(!cmd.project().contains(&node));
        assert!(!cmd.can_undo());
        assert!(cmd.redo());
        assert!(cmd.project().contains(&node));
    }

    #[test]
    fn test_repeated_sets_merge() {
        let mut cmd = commands();
        let node = cmd.create_object("Node", "node", None).unwrap();
        let visible = ValueHandle::property(node.clone(), "visibility");
        let name = ValueHandle::property(node, "objectName");

        cmd.set(&visible, false).unwrap();
        cmd.set(&visible, true).unwrap();
        cmd.set(&visible, false).unwrap();
        assert_eq!(cmd.undo_stack().size(), 3);

        cmd.set(&name, "renamed").unwrap();
        assert_eq!(cmd.undo_stack().size(), 4);
    }

    #[test]
    fn test_rejected_command_pushes_nothing() {
        let mut cmd = commands();
        let node = cmd.create_object("Node", "node", None).unwrap();
        let size = cmd.undo_stack().size();
        assert!(cmd.set(&ValueHandle::property(node, "visibility"), 1).is_err());
        assert!(cmd.create_object("Nope", "x", None).is_err());
        assert_eq!(cmd.undo_stack().size(), size);
    }

    #[test]
    fn test_create_below_parent() {
        let mut cmd = commands();
        let parent = cmd.create_object("Node", "parent", None).unwrap();
        let child = cmd.create_object("MeshNode", "child", Some(&parent)).unwrap();
        assert_eq!(cmd.project().parent_of(&child), Some(&parent));
        assert!(cmd.undo());
        assert!(!cmd.project().contains(&child));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.vproj");
        let mut cmd = commands();
        let node = cmd.create_object("Node", "node", None).unwrap();
        cmd.save(&path).unwrap();

        let mut other = commands();
        other.load(&path).unwrap();
        assert!(other.project().contains(&node));
        assert!(!other.can_undo());
        assert_eq!(other.project().current_path(), Some(path.as_path()));
    }
}
