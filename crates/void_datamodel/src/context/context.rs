//! Context - the only mutation gateway of a project
//!
//! ## Architecture
//!
//! ```text
//!   caller ──► Context::set / create_object / add_link / ...
//!                 │ validate (handle, type, loop) ── Err: nothing changed
//!                 ▼
//!              Project (arena + indexes)
//!                 │
//!                 ├─► object hooks (script parse, resource load, ...)
//!                 ├─► Errors (per-handle findings)
//!                 └─► ChangeRecorders { undo, live }
//! ```
//!
//! ## Key Concepts
//!
//! - **Atomic calls**: every public operation validates before touching
//!   the project and fails as a whole with a [`ContextError`].
//! - **Side effects**: after a change the affected object's hooks run, link
//!   validity is re-derived and self-clearing warnings are dropped.
//! - **Hot reload**: watcher threads only post [`FileChange`] events; the
//!   project is touched in [`Context::process_file_changes`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use void_core::{ErrorCategory, ErrorLevel, FileChange, FileChangeQueue, FileChangeSender, FileWatcher, ObjectId};
use void_reflection::{PathSegment, Property, Value, ValueError};

use super::mutation::ModelAccess;
use super::recorder::{ChangeRecorder, ChangeRecorders};
use crate::assets::resources::{FileResourceCache, ResourceCache};
use crate::core::errors::Errors;
use crate::core::handle::ValueHandle;
use crate::core::link::Link;
use crate::core::object::{EditorObject, CHILDREN_PROPERTY};
use crate::core::project::{Project, ProjectSnapshot};
use crate::engine::{EngineInterface, NullEngine};
use crate::error::{ContextError, Result};
use crate::scene::clipboard;
use crate::types::{ErrorUpdate, HookEnv, ObjectFactory, SyncReason};

/// Transactional access to one project
pub struct Context {
    project: Project,
    factory: Arc<ObjectFactory>,
    recorders: ChangeRecorders,
    errors: Errors,
    engine: Arc<dyn EngineInterface>,
    resources: Arc<dyn ResourceCache>,
    file_queue: FileChangeQueue,
    watcher: Option<Box<dyn FileWatcher>>,
    watched: BTreeMap<PathBuf, BTreeSet<ObjectId>>,
}

impl Context {
    /// Context over an empty project, without script parsing or file watching
    pub fn new(factory: Arc<ObjectFactory>) -> Self {
        Self {
            project: Project::new(),
            factory,
            recorders: ChangeRecorders::new(),
            errors: Errors::new(),
            engine: Arc::new(NullEngine),
            resources: Arc::new(FileResourceCache::new()),
            file_queue: FileChangeQueue::new(),
            watcher: None,
            watched: BTreeMap::new(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn EngineInterface>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_resources(mut self, resources: Arc<dyn ResourceCache>) -> Self {
        self.resources = resources;
        self
    }

    /// Install a watcher built around this context's change queue
    pub fn with_file_watcher(mut self, make: impl FnOnce(FileChangeSender) -> Box<dyn FileWatcher>) -> Self {
        self.watcher = Some(make(self.file_queue.sender()));
        let paths: Vec<PathBuf> = self.watched.keys().cloned().collect();
        for path in paths {
            self.watch_path(&path);
        }
        self
    }

    // ---- read access ---------------------------------------------------

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn factory(&self) -> &Arc<ObjectFactory> {
        &self.factory
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub fn recorders(&self) -> &ChangeRecorders {
        &self.recorders
    }

    /// Changes since the last call, for refreshing live views
    pub fn take_live_changes(&mut self) -> ChangeRecorder {
        self.recorders.take_live()
    }

    /// Sender for posting file changes from other threads
    pub fn file_change_sender(&self) -> FileChangeSender {
        self.file_queue.sender()
    }

    /// Files currently watched on behalf of objects
    pub fn watched_paths(&self) -> impl Iterator<Item = &Path> {
        self.watched.keys().map(PathBuf::as_path)
    }

    // ---- objects -------------------------------------------------------

    /// Create an object of a registered kind; a random id is used if none
    /// is given
    pub fn create_object(&mut self, kind: &str, name: &str, id: Option<ObjectId>) -> Result<ObjectId> {
        let id = id.unwrap_or_else(ObjectId::generate);
        if self.project.contains(&id) {
            return Err(ContextError::DuplicateId(id));
        }
        let object = self.factory.create(kind, id.clone(), name)?;
        self.project.insert_object(object);
        self.recorders.record_create(&id);
        log::debug!("Created {} '{}' ({})", kind, name, id);

        self.run_hooks(&id, SyncReason::Created);
        self.update_watches(&id);
        Ok(id)
    }

    /// Delete objects and their scene graph descendants, collecting unused
    /// external project mappings. Returns the number of deleted objects.
    pub fn delete_objects(&mut self, ids: &[ObjectId]) -> usize {
        self.delete_objects_with(ids, true, true)
    }

    /// Delete objects.
    ///
    /// Links touching deleted objects are removed; references to them are
    /// cleared, and removed from reference arrays.
    pub fn delete_objects_with(&mut self, ids: &[ObjectId], include_children: bool, gc_external_projects: bool) -> usize {
        let mut doomed: BTreeSet<ObjectId> = BTreeSet::new();
        for id in ids.iter().filter(|id| self.project.contains(id)) {
            doomed.insert(id.clone());
            if include_children {
                doomed.extend(self.project.descendants(id));
            }
        }
        if doomed.is_empty() {
            return 0;
        }

        for id in &doomed {
            self.run_before_delete(id);
        }

        let links: Vec<Link> = doomed
            .iter()
            .flat_map(|id| self.project.links_touching(id))
            .cloned()
            .collect();
        for link in links {
            self.remove_link_entry(&link.end);
        }

        let holders: BTreeSet<ObjectId> = doomed
            .iter()
            .flat_map(|id| self.project.referencing(id))
            .filter(|holder| !doomed.contains(holder))
            .collect();

        let order: Vec<ObjectId> = self
            .project
            .instance_ids()
            .iter()
            .filter(|id| doomed.contains(*id))
            .cloned()
            .collect();
        for id in &order {
            self.project.remove_object(id);
            self.recorders.record_delete(id);
            for handle in self.errors_for(id) {
                self.errors.remove_error(&handle);
                self.recorders.record_errors_changed(&handle);
            }
            self.unwatch_object(id);
        }

        for holder in holders {
            self.remove_references(&holder, &doomed);
        }

        if gc_external_projects && !self.project.gc_external_project_mapping().is_empty() {
            self.recorders.record_external_projects_changed();
        }
        log::debug!("Deleted {} object(s)", order.len());
        order.len()
    }

    fn errors_for(&self, id: &ObjectId) -> Vec<ValueHandle> {
        self.errors.for_object(id).map(|e| e.handle.clone()).collect()
    }

    fn remove_references(&mut self, holder: &ObjectId, targets: &BTreeSet<ObjectId>) {
        let mut changed: Vec<Vec<PathSegment>> = Vec::new();
        self.project.modify_object(holder, |object| {
            for (name, property) in object.properties_mut().iter_mut() {
                let mut prefix = vec![PathSegment::from(name)];
                property.value.remove_references_to(targets, &mut prefix, &mut changed);
            }
        });
        for path in changed {
            let handle = ValueHandle::new(holder.clone(), path);
            if handle.root_property() == Some(CHILDREN_PROPERTY) {
                self.recorders.record_structure_changed(&handle);
            }
            self.recorders.record_value_changed(&handle);
        }
        self.revalidate_links_of(holder);
    }

    /// Move an object below a new parent, or to the top level.
    ///
    /// `insert_before` indexes the new parent's children after the object
    /// has been taken out of its old parent; `None` appends.
    pub fn move_scenegraph_child(
        &mut self,
        object: &ObjectId,
        new_parent: Option<&ObjectId>,
        insert_before: Option<usize>,
    ) -> Result<()> {
        if !self.project.contains(object) {
            return Err(ContextError::NoSuchObject(object.clone()));
        }
        if let Some(parent) = new_parent {
            if !self.project.contains(parent) {
                return Err(ContextError::NoSuchObject(parent.clone()));
            }
            if self.project.is_in_subtree(parent, object) {
                return Err(ContextError::SceneGraphLoop(object.clone()));
            }
        }

        if let Some(old_parent) = self.project.parent_of(object).cloned() {
            self.project.modify_object(&old_parent, |o| {
                if let Some(children) = o.properties_mut().get_mut(CHILDREN_PROPERTY).and_then(|p| p.value.as_array_mut()) {
                    children.retain(|p| p.value.as_ref_id() != Some(object));
                }
            });
            self.record_children_changed(&old_parent);
        }

        if let Some(parent) = new_parent {
            let inserted = self.project.modify_object(parent, |o| -> Result<()> {
                let children = o
                    .properties_mut()
                    .get_mut(CHILDREN_PROPERTY)
                    .and_then(|p| p.value.as_array_mut())
                    .ok_or_else(|| ContextError::InvalidHandle(format!("{}.{}", parent, CHILDREN_PROPERTY)))?;
                let index = insert_before.unwrap_or(children.len()).min(children.len());
                children.insert(index, Property::new(object.clone()))?;
                Ok(())
            });
            inserted.unwrap_or(Ok(()))?;
            self.record_children_changed(parent);
        }
        Ok(())
    }

    fn record_children_changed(&mut self, parent: &ObjectId) {
        let handle = ValueHandle::property(parent.clone(), CHILDREN_PROPERTY);
        self.recorders.record_structure_changed(&handle);
        self.recorders.record_value_changed(&handle);
    }

    // ---- values --------------------------------------------------------

    fn writable_property(&self, handle: &ValueHandle) -> Result<&Property> {
        let object = self
            .project
            .get_instance_by_id(handle.object_id())
            .ok_or_else(|| ContextError::NoSuchObject(handle.object_id().clone()))?;
        // imported objects only change through the external reference update
        if object.is_external_reference() {
            return Err(ContextError::ReadOnly(handle.to_string()));
        }
        let property = handle
            .resolve(&self.project)
            .ok_or_else(|| ContextError::InvalidHandle(handle.to_string()))?;
        if property.is_read_only() || handle.root_property() == Some(CHILDREN_PROPERTY) {
            return Err(ContextError::ReadOnly(handle.to_string()));
        }
        Ok(property)
    }

    /// Set a property value; the type must match the current value
    pub fn set(&mut self, handle: &ValueHandle, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let current = &self.writable_property(handle)?.value;
        let (expected, found) = (current.value_type(), value.value_type());
        if expected != found {
            return Err(ValueError::TypeMismatch { expected, found }.into());
        }
        if let Value::Ref(Some(target)) = &value {
            if !self.project.contains(target) {
                return Err(ContextError::NoSuchObject(target.clone()));
            }
        }
        if *current == value {
            return Ok(());
        }

        let assigned = self
            .project
            .modify_object(handle.object_id(), |o| match o.resolve_mut(handle.path()) {
                Some(property) => property.value.assign(value).map_err(ContextError::from),
                None => Err(ContextError::InvalidHandle(handle.to_string())),
            });
        assigned.unwrap_or_else(|| Err(ContextError::NoSuchObject(handle.object_id().clone())))?;
        self.after_value_change(handle);
        Ok(())
    }

    pub fn set_bool(&mut self, handle: &ValueHandle, value: bool) -> Result<()> {
        self.set(handle, value)
    }

    pub fn set_int(&mut self, handle: &ValueHandle, value: i32) -> Result<()> {
        self.set(handle, value)
    }

    pub fn set_int64(&mut self, handle: &ValueHandle, value: i64) -> Result<()> {
        self.set(handle, value)
    }

    pub fn set_double(&mut self, handle: &ValueHandle, value: f64) -> Result<()> {
        self.set(handle, value)
    }

    pub fn set_string(&mut self, handle: &ValueHandle, value: impl Into<String>) -> Result<()> {
        self.set(handle, value.into())
    }

    pub fn set_ref(&mut self, handle: &ValueHandle, target: Option<ObjectId>) -> Result<()> {
        self.set(handle, target)
    }

    fn after_value_change(&mut self, handle: &ValueHandle) {
        self.recorders.record_value_changed(handle);
        let object = handle.object_id().clone();
        for cleared in self.errors.clear_self_clearing(&object) {
            self.recorders.record_errors_changed(&cleared);
        }
        self.run_hooks(&object, SyncReason::ValueChanged(handle.path().to_vec()));
        self.update_watches(&object);
        self.revalidate_links_of(&object);
    }

    /// Add a named entry to a table, or append an element to an array.
    /// Returns the handle of the new child.
    pub fn add_property(&mut self, container: &ValueHandle, name: &str, property: Property) -> Result<ValueHandle> {
        self.writable_property(container)?;
        let added = self.project.modify_object(container.object_id(), |o| -> Result<ValueHandle> {
            let target = o
                .resolve_mut(container.path())
                .ok_or_else(|| ContextError::InvalidHandle(container.to_string()))?;
            target.value.add_property(name, property)?;
            Ok(match &target.value {
                Value::Array(array) => container.at(array.len() - 1),
                _ => container.get(name),
            })
        });
        let child = added.unwrap_or_else(|| Err(ContextError::NoSuchObject(container.object_id().clone())))?;
        self.recorders.record_structure_changed(container);
        self.after_value_change(container);
        Ok(child)
    }

    /// Remove a table entry or array element
    pub fn remove_property(&mut self, handle: &ValueHandle) -> Result<Property> {
        let parent = handle
            .parent()
            .filter(|p| !p.is_object())
            .ok_or_else(|| ContextError::ReadOnly(handle.to_string()))?;
        self.writable_property(&parent)?;
        let segment = handle
            .path()
            .last()
            .cloned()
            .ok_or_else(|| ContextError::InvalidHandle(handle.to_string()))?;
        let removed = self.project.modify_object(handle.object_id(), |o| -> Result<Property> {
            let container = o
                .resolve_mut(parent.path())
                .ok_or_else(|| ContextError::InvalidHandle(parent.to_string()))?;
            Ok(container.value.remove_property(&segment)?)
        });
        let property = removed.unwrap_or_else(|| Err(ContextError::NoSuchObject(handle.object_id().clone())))?;
        self.recorders.record_structure_changed(&parent);
        self.after_value_change(&parent);
        Ok(property)
    }

    /// Grow or shrink an array, filling with the element type's default
    pub fn resize_array(&mut self, handle: &ValueHandle, len: usize) -> Result<()> {
        let current = self.writable_property(handle)?;
        let array = current
            .value
            .as_array()
            .ok_or_else(|| ContextError::Value(ValueError::NotContainer(current.value.value_type())))?;
        if array.len() == len {
            return Ok(());
        }
        let fill = Property::new(self.factory.structs().default_value(array.element_type())?);
        let resized = self.project.modify_object(handle.object_id(), |o| -> Result<()> {
            let array = o
                .resolve_mut(handle.path())
                .and_then(|p| p.value.as_array_mut())
                .ok_or_else(|| ContextError::InvalidHandle(handle.to_string()))?;
            Ok(array.resize(len, &fill)?)
        });
        resized.unwrap_or_else(|| Err(ContextError::NoSuchObject(handle.object_id().clone())))?;
        self.recorders.record_structure_changed(handle);
        self.after_value_change(handle);
        Ok(())
    }

    // ---- links ---------------------------------------------------------

    /// Link `start` to `end`.
    ///
    /// Any existing link ending at `end`, inside it, or at a property
    /// containing it is replaced. Strong links must not close a cycle.
    /// Both handles are stored in their canonical spelling.
    pub fn add_link(&mut self, start: &ValueHandle, end: &ValueHandle, weak: bool) -> Result<Link> {
        let canonical = |handle: &ValueHandle| {
            handle
                .canonical(&self.project)
                .ok_or_else(|| ContextError::InvalidHandle(handle.to_string()))
        };
        let start = canonical(start)?;
        let end = canonical(end)?;
        let (start, end) = (&start, &end);
        let not_allowed = |reason: &str| ContextError::LinkNotAllowed {
            start: start.to_string(),
            end: end.to_string(),
            reason: reason.to_string(),
        };
        let start_type = start
            .value_type(&self.project)
            .ok_or_else(|| ContextError::InvalidHandle(start.to_string()))?;
        let end_type = end
            .value_type(&self.project)
            .ok_or_else(|| ContextError::InvalidHandle(end.to_string()))?;
        if !start.link_capability(&self.project).is_some_and(|c| c.can_start()) {
            return Err(not_allowed("start property is not a link output"));
        }
        if !end.link_capability(&self.project).is_some_and(|c| c.can_end()) {
            return Err(not_allowed("end property is not a link input"));
        }
        if start_type != end_type {
            return Err(not_allowed(&format!("type {} does not match {}", start_type, end_type)));
        }
        if !weak && self.project.creates_loop(start, end) {
            return Err(ContextError::LinkLoop {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let replaced: Vec<ValueHandle> = self
            .project
            .links_ending_at(end.object_id())
            .into_iter()
            .filter(|l| end.contains_or_equals(&l.end) || l.end.contains(end))
            .map(|l| l.end.clone())
            .collect();
        for existing in replaced {
            self.remove_link_entry(&existing);
        }

        let link = if weak {
            Link::weak(start.clone(), end.clone())
        } else {
            Link::new(start.clone(), end.clone())
        };
        self.project.add_link(link.clone());
        self.recorders.record_add_link(&link);
        log::debug!("Linked {} -> {}{}", start, end, if weak { " (weak)" } else { "" });
        Ok(link)
    }

    /// Remove the link ending at `end`; returns whether one existed
    pub fn remove_link(&mut self, end: &ValueHandle) -> bool {
        let end = end.canonical(&self.project).unwrap_or_else(|| end.clone());
        self.remove_link_entry(&end).is_some()
    }

    fn remove_link_entry(&mut self, end: &ValueHandle) -> Option<Link> {
        let link = self.project.remove_link(end)?;
        self.recorders.record_remove_link(&link);
        if self.errors.remove_error_of(end, ErrorCategory::BrokenLink) {
            self.recorders.record_errors_changed(end);
        }
        Some(link)
    }

    /// Re-derive the validity of every link
    pub fn update_link_validity(&mut self) -> usize {
        let ends: Vec<ValueHandle> = self.project.links().map(|l| l.end.clone()).collect();
        ends.iter().filter(|end| self.revalidate_link(end)).count()
    }

    fn revalidate_links_of(&mut self, object: &ObjectId) {
        let ends: Vec<ValueHandle> = self
            .project
            .links_touching(object)
            .into_iter()
            .map(|l| l.end.clone())
            .collect();
        for end in ends {
            self.revalidate_link(&end);
        }
    }

    /// Returns whether the validity flag changed
    fn revalidate_link(&mut self, end: &ValueHandle) -> bool {
        let Some(link) = self.project.link_ending_at(end) else {
            return false;
        };
        let valid = link_is_valid(&self.project, link);
        let start = link.start.clone();
        if valid {
            if self.errors.remove_error_of(end, ErrorCategory::BrokenLink) {
                self.recorders.record_errors_changed(end);
            }
        } else if self.errors.add_error(
            ErrorCategory::BrokenLink,
            ErrorLevel::Warning,
            end.clone(),
            format!("Link from '{}' is broken", start),
        ) {
            self.recorders.record_errors_changed(end);
        }

        if !self.project.set_link_validity(end, valid) {
            return false;
        }
        if let Some(link) = self.project.link_ending_at(end).cloned() {
            self.recorders.record_link_validity_change(&link);
        }
        true
    }

    // ---- project level -------------------------------------------------

    /// Mark an object as driven by external code
    pub fn set_code_controlled(&mut self, id: &ObjectId, controlled: bool) -> Result<()> {
        if !self.project.contains(id) {
            return Err(ContextError::NoSuchObject(id.clone()));
        }
        if self.project.set_code_controlled(id, controlled) {
            self.recorders.record_code_controlled_changed();
        }
        Ok(())
    }

    /// Register an external project by id and absolute path
    pub fn add_external_project_mapping(&mut self, project_id: &str, path: &Path, name: &str) -> Result<()> {
        if self.project.add_external_project_mapping(project_id, path, name)? {
            self.recorders.record_external_projects_changed();
        }
        Ok(())
    }

    /// Record a user-visible finding against a handle
    pub fn add_error(&mut self, category: ErrorCategory, level: ErrorLevel, handle: ValueHandle, message: impl Into<String>) {
        if self.errors.add_error(category, level, handle.clone(), message) {
            self.recorders.record_errors_changed(&handle);
        }
    }

    pub fn remove_error(&mut self, handle: &ValueHandle) {
        if self.errors.remove_error(handle) {
            self.recorders.record_errors_changed(handle);
        }
    }

    /// Remove the item on `handle` only if it has the given category
    pub fn remove_error_of(&mut self, handle: &ValueHandle, category: ErrorCategory) {
        if self.errors.remove_error_of(handle, category) {
            self.recorders.record_errors_changed(handle);
        }
    }

    /// Clipboard text for `ids`, with their descendants if `deep`
    pub fn copy_objects(&self, ids: &[ObjectId], deep: bool) -> Result<String> {
        clipboard::copy_objects(&self.project, &self.factory, ids, deep)
    }

    /// Paste clipboard text below `parent`; returns the new ids
    pub fn paste_objects(&mut self, text: &str, parent: Option<&ObjectId>) -> Result<Vec<ObjectId>> {
        clipboard::paste_objects(self, text, parent)
    }

    // ---- hooks and file watching ---------------------------------------

    fn run_hooks(&mut self, id: &ObjectId, reason: SyncReason) {
        let Some(object) = self.project.get_instance_by_id(id) else {
            return;
        };
        let Some(hooks) = self.factory.hooks(object.type_name()) else {
            return;
        };
        let mut updated = object.clone();
        let mut env = HookEnv::new(
            self.engine.as_ref(),
            self.resources.as_ref(),
            self.factory.structs(),
            self.project.current_folder(),
        );
        hooks.sync(&mut updated, &reason, &mut env);
        let updates = env.into_updates();

        self.replace_object(updated);
        self.apply_error_updates(id, updates);
    }

    fn run_before_delete(&mut self, id: &ObjectId) {
        let Some(object) = self.project.get_instance_by_id(id) else {
            return;
        };
        let Some(hooks) = self.factory.hooks(object.type_name()) else {
            return;
        };
        let mut env = HookEnv::new(
            self.engine.as_ref(),
            self.resources.as_ref(),
            self.factory.structs(),
            self.project.current_folder(),
        );
        hooks.on_before_delete(object, &mut env);
    }

    /// Store a hook's copy of an object, recording what differs
    fn replace_object(&mut self, updated: EditorObject) {
        let id = updated.id().clone();
        let Some(current) = self.project.get_instance_by_id(&id) else {
            return;
        };
        if *current == updated {
            return;
        }
        let mut changed = Vec::new();
        for (name, property) in updated.properties().iter() {
            let before = current.property(name);
            if before != Some(property) {
                let structure = match (before.map(|p| &p.value), &property.value) {
                    (Some(Value::Table(a)), Value::Table(b)) => !a.names().eq(b.names()),
                    _ => false,
                };
                changed.push((ValueHandle::property(id.clone(), name), structure));
            }
        }
        self.project.modify_object(&id, |o| *o = updated);
        for (handle, structure) in changed {
            if structure {
                self.recorders.record_structure_changed(&handle);
            }
            self.recorders.record_value_changed(&handle);
        }
        self.revalidate_links_of(&id);
    }

    fn apply_error_updates(&mut self, id: &ObjectId, updates: Vec<ErrorUpdate>) {
        for update in updates {
            match update {
                ErrorUpdate::Set {
                    path,
                    category,
                    level,
                    message,
                } => self.add_error(category, level, ValueHandle::new(id.clone(), path), message),
                ErrorUpdate::Clear { path, category } => {
                    let handle = ValueHandle::new(id.clone(), path);
                    if self.errors.remove_error_of(&handle, category) {
                        self.recorders.record_errors_changed(&handle);
                    }
                }
            }
        }
    }

    fn watched_files_of(&self, id: &ObjectId) -> BTreeSet<PathBuf> {
        let Some(object) = self.project.get_instance_by_id(id) else {
            return BTreeSet::new();
        };
        let Some(hooks) = self.factory.hooks(object.type_name()) else {
            return BTreeSet::new();
        };
        hooks
            .uri_properties()
            .iter()
            .filter_map(|property| object.value(property).and_then(Value::as_str))
            .filter(|uri| !uri.is_empty())
            .map(|uri| crate::core::paths::resolve_in(self.project.current_folder(), uri))
            .collect()
    }

    fn update_watches(&mut self, id: &ObjectId) {
        let wanted = self.watched_files_of(id);
        let stale: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|(path, ids)| ids.contains(id) && !wanted.contains(*path))
            .map(|(path, _)| path.clone())
            .collect();
        for path in stale {
            self.release_watch(&path, id);
        }
        for path in wanted {
            let ids = self.watched.entry(path.clone()).or_default();
            let first = ids.is_empty();
            ids.insert(id.clone());
            if first {
                self.watch_path(&path);
            }
        }
    }

    fn unwatch_object(&mut self, id: &ObjectId) {
        let paths: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|(_, ids)| ids.contains(id))
            .map(|(path, _)| path.clone())
            .collect();
        for path in paths {
            self.release_watch(&path, id);
        }
    }

    fn release_watch(&mut self, path: &Path, id: &ObjectId) {
        if let Some(ids) = self.watched.get_mut(path) {
            ids.remove(id);
            if ids.is_empty() {
                self.watched.remove(path);
                if let Some(watcher) = self.watcher.as_mut() {
                    watcher.unwatch(path);
                }
            }
        }
    }

    fn watch_path(&mut self, path: &Path) {
        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(e) = watcher.watch(path) {
                log::warn!("Cannot watch {:?}: {}", path, e);
            }
        }
    }

    /// Re-sync objects whose files changed since the last call. Returns the
    /// number of objects that were re-synced.
    pub fn process_file_changes(&mut self) -> usize {
        let changes: Vec<FileChange> = self.file_queue.drain();
        let mut count = 0;
        for change in changes {
            let ids: Vec<ObjectId> = self
                .watched
                .get(&change.path)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default();
            for id in ids {
                log::debug!("File {:?} changed, re-syncing {}", change.path, id);
                self.run_hooks(&id, SyncReason::FileChanged(change.path.clone()));
                count += 1;
            }
        }
        count
    }

    // ---- whole-project operations --------------------------------------

    /// Replace the project with a freshly loaded one.
    ///
    /// Migration advisories become self-clearing warnings, every object's
    /// hooks run, link validity is derived and the recorders are cleared.
    pub fn adopt_project(&mut self, project: Project, migration_warnings: &BTreeMap<ObjectId, Vec<String>>) {
        for path in std::mem::take(&mut self.watched).into_keys() {
            if let Some(watcher) = self.watcher.as_mut() {
                watcher.unwatch(&path);
            }
        }
        self.project = project;
        self.errors.clear();
        for (id, messages) in migration_warnings {
            if self.project.contains(id) {
                self.errors.add_error(
                    ErrorCategory::MigrationWarning,
                    ErrorLevel::Warning,
                    ValueHandle::for_object(id.clone()),
                    messages.join("\n"),
                );
            }
        }
        let ids: Vec<ObjectId> = self.project.instance_ids().to_vec();
        for id in &ids {
            self.run_hooks(id, SyncReason::Loaded);
            self.update_watches(id);
        }
        self.update_link_validity();
        self.recorders = ChangeRecorders::new();
        log::info!("Adopted project with {} object(s)", ids.len());
    }
}

impl ModelAccess for Context {
    fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    fn recorders_mut(&mut self) -> &mut ChangeRecorders {
        &mut self.recorders
    }

    fn insert_objects(&mut self, objects: Vec<EditorObject>) -> Result<Vec<ObjectId>> {
        let batch: BTreeSet<ObjectId> = objects.iter().map(|o| o.id().clone()).collect();
        for object in &objects {
            if self.project.contains(object.id()) {
                return Err(ContextError::DuplicateId(object.id().clone()));
            }
            if let Some(missing) = object
                .referenced_ids()
                .into_iter()
                .find(|target| !batch.contains(target) && !self.project.contains(target))
            {
                return Err(ContextError::NoSuchObject(missing));
            }
        }

        let ids: Vec<ObjectId> = objects.iter().map(|o| o.id().clone()).collect();
        for object in objects {
            let id = object.id().clone();
            self.project.insert_object(object);
            self.recorders.record_create(&id);
        }
        for id in &ids {
            self.run_hooks(id, SyncReason::Created);
            self.update_watches(id);
        }
        Ok(ids)
    }

    fn insert_link(&mut self, link: Link) -> bool {
        if !self.project.contains(link.start_object()) || !self.project.contains(link.end_object()) {
            return false;
        }
        if !link.weak && self.project.creates_loop(&link.start, &link.end) {
            return false;
        }
        let end = link.end.clone();
        if let Some(existing) = self.project.link_ending_at(&end) {
            if existing.start == link.start && existing.weak == link.weak {
                return false;
            }
            self.remove_link_entry(&end);
        }
        self.recorders.record_add_link(&link);
        self.project.add_link(link);
        self.revalidate_link(&end);
        true
    }

    fn assign_value(&mut self, handle: &ValueHandle, value: Value) -> Result<()> {
        let current = handle
            .value(&self.project)
            .ok_or_else(|| ContextError::InvalidHandle(handle.to_string()))?;
        if *current == value {
            return Ok(());
        }
        let assigned = self
            .project
            .modify_object(handle.object_id(), |o| -> Result<()> {
                let property = o
                    .resolve_mut(handle.path())
                    .ok_or_else(|| ContextError::InvalidHandle(handle.to_string()))?;
                property.value = value;
                Ok(())
            });
        assigned.unwrap_or_else(|| Err(ContextError::NoSuchObject(handle.object_id().clone())))?;
        self.recorders.record_value_changed(handle);
        self.revalidate_links_of(handle.object_id());
        Ok(())
    }

    fn restore_snapshot(&mut self, snapshot: &ProjectSnapshot) {
        let before = self.project.snapshot();
        self.project.restore(snapshot);

        let old_ids: BTreeSet<&ObjectId> = before.object_ids().iter().collect();
        let new_ids: BTreeSet<&ObjectId> = snapshot.object_ids().iter().collect();
        for &id in old_ids.difference(&new_ids) {
            self.recorders.record_delete(id);
            for handle in self.errors_for(id) {
                self.remove_error(&handle);
            }
            self.unwatch_object(id);
        }
        for &id in new_ids.difference(&old_ids) {
            self.recorders.record_create(id);
        }
        for &id in new_ids.intersection(&old_ids) {
            if before.shares_object(snapshot, id) {
                continue;
            }
            let (Some(old), Some(new)) = (before.object(id), snapshot.object(id)) else {
                continue;
            };
            for (name, property) in new.properties().iter() {
                if old.property(name) != Some(property) {
                    self.recorders
                        .record_value_changed(&ValueHandle::property(id.clone(), name));
                }
            }
        }

        let old_links: BTreeSet<&Link> = before.links().iter().collect();
        let new_links: BTreeSet<&Link> = snapshot.links().iter().collect();
        for &link in old_links.difference(&new_links) {
            self.recorders.record_remove_link(link);
        }
        for &link in new_links.difference(&old_links) {
            self.recorders.record_add_link(link);
        }
        if &before.external_projects != self.project.external_projects() {
            self.recorders.record_external_projects_changed();
        }

        // objects that came back or changed get their derived state back
        let resynced: Vec<ObjectId> = new_ids
            .iter()
            .filter(|&&id| !old_ids.contains(id) || !before.shares_object(snapshot, id))
            .map(|&id| id.clone())
            .collect();
        for id in &resynced {
            self.run_hooks(id, SyncReason::Loaded);
            self.update_watches(id);
        }
        self.update_link_validity();
    }
}

/// Both ends resolve, accept the link direction and agree on the type
fn link_is_valid(project: &Project, link: &Link) -> bool {
    match (link.start.value_type(project), link.end.value_type(project)) {
        (Some(start), Some(end)) => {
            start == end
                && link.start.link_capability(project).is_some_and(|c| c.can_start())
                && link.end.link_capability(project).is_some_and(|c| c.can_end())
        }
        _ => false,
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("objects", &self.project.len())
            .field("links", &self.project.link_count())
            .field("errors", &self.errors.len())
            .field("watched", &self.watched.len())
            .finish()
    }
}
