//! Per-kind side effects
//!
//! Hooks run after the context has changed an object, on the object alone.
//! A hook receives a private copy of its object plus read-only access to
//! the collaborators, so it cannot reach the project or the context and
//! cannot re-enter a running operation. The context diffs the copy against
//! the stored object, records the changes and applies the error updates
//! the hook reported.

use std::fmt;
use std::path::{Path, PathBuf};

use void_core::{ErrorCategory, ErrorLevel};
use void_reflection::{Annotation, PathSegment, StructRegistry, Table, Value};

use crate::assets::resources::{ResourceCache, ResourceKind};
use crate::core::object::EditorObject;
use crate::core::paths::resolve_in;
use crate::engine::{build_linkable_table, EngineInterface, PropertyInterface};

/// Why a hook runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReason {
    Created,
    Loaded,
    /// A property at this path (relative to the object) was changed
    ValueChanged(Vec<PathSegment>),
    /// A file the object depends on changed on disk
    FileChanged(PathBuf),
}

impl SyncReason {
    /// Whether this run concerns the given top-level property
    pub fn touches(&self, property: &str) -> bool {
        match self {
            Self::ValueChanged(path) => path.first().and_then(PathSegment::as_name) == Some(property),
            _ => true,
        }
    }
}

/// An error list change requested by a hook
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorUpdate {
    Set {
        path: Vec<PathSegment>,
        category: ErrorCategory,
        level: ErrorLevel,
        message: String,
    },
    Clear {
        path: Vec<PathSegment>,
        category: ErrorCategory,
    },
}

/// What a hook may see besides its object
pub struct HookEnv<'a> {
    pub engine: &'a dyn EngineInterface,
    pub resources: &'a dyn ResourceCache,
    pub structs: &'a StructRegistry,
    project_folder: Option<&'a Path>,
    updates: Vec<ErrorUpdate>,
}

impl<'a> HookEnv<'a> {
    pub fn new(
        engine: &'a dyn EngineInterface,
        resources: &'a dyn ResourceCache,
        structs: &'a StructRegistry,
        project_folder: Option<&'a Path>,
    ) -> Self {
        Self {
            engine,
            resources,
            structs,
            project_folder,
            updates: Vec::new(),
        }
    }

    /// Absolute path of a project-relative uri; `None` for empty uris
    pub fn resolve_uri(&self, uri: &str) -> Option<PathBuf> {
        (!uri.is_empty()).then(|| resolve_in(self.project_folder, uri))
    }

    pub fn report(&mut self, path: &[PathSegment], category: ErrorCategory, level: ErrorLevel, message: impl Into<String>) {
        self.updates.push(ErrorUpdate::Set {
            path: path.to_vec(),
            category,
            level,
            message: message.into(),
        });
    }

    pub fn clear(&mut self, path: &[PathSegment], category: ErrorCategory) {
        self.updates.push(ErrorUpdate::Clear {
            path: path.to_vec(),
            category,
        });
    }

    pub fn into_updates(self) -> Vec<ErrorUpdate> {
        self.updates
    }
}

/// Side effects attached to an object kind
pub trait ObjectHooks: Send + Sync {
    /// Top-level string properties holding file uris; the context watches
    /// the files they name
    fn uri_properties(&self) -> &'static [&'static str] {
        &[]
    }

    /// Bring derived state of `object` up to date
    fn sync(&self, object: &mut EditorObject, reason: &SyncReason, env: &mut HookEnv<'_>);

    /// Last look at an object before it is removed
    fn on_before_delete(&self, _object: &EditorObject, _env: &mut HookEnv<'_>) {}
}

impl fmt::Debug for dyn ObjectHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHooks")
            .field("uri_properties", &self.uri_properties())
            .finish()
    }
}

fn name_path(name: &str) -> Vec<PathSegment> {
    vec![PathSegment::from(name)]
}

fn read_uri(object: &EditorObject, property: &str, env: &HookEnv<'_>) -> Result<Option<String>, String> {
    let uri = object.value(property).and_then(Value::as_str).unwrap_or_default();
    let Some(path) = env.resolve_uri(uri) else {
        return Ok(None);
    };
    std::fs::read_to_string(&path)
        .map(Some)
        .map_err(|e| format!("Cannot read {:?}: {}", path, e))
}

/// Carry over values of entries that kept their name and type
pub fn merge_table(new: &mut Table, old: &Table) {
    for (name, property) in new.iter_mut() {
        let Some(previous) = old.get(name) else {
            continue;
        };
        match (&mut property.value, &previous.value) {
            (Value::Table(new), Value::Table(old)) => merge_table(new, old),
            (value, old) if value.value_type() == old.value_type() => *value = old.clone(),
            _ => {}
        }
    }
}

fn replace_table(object: &mut EditorObject, name: &str, mut table: Table) {
    let Some(property) = object.properties_mut().get_mut(name) else {
        return;
    };
    if let Some(old) = property.value.as_table() {
        merge_table(&mut table, old);
    }
    property.value = Value::Table(table);
}

fn build_or_report(
    interfaces: &[PropertyInterface],
    link: &Annotation,
    env: &mut HookEnv<'_>,
) -> Option<Table> {
    match build_linkable_table(interfaces, env.structs, link) {
        Ok(table) => Some(table),
        Err(e) => {
            env.report(&[], ErrorCategory::ParseError, ErrorLevel::Error, e.to_string());
            None
        }
    }
}

/// Scripts and script interfaces: parse the file, sync `inputs` and `outputs`
#[derive(Debug, Clone)]
pub struct ScriptHooks {
    input_link: Annotation,
    has_outputs: bool,
}

impl ScriptHooks {
    /// Hooks for scripts, whose inputs are link ends and outputs link starts
    pub fn script() -> Self {
        Self {
            input_link: Annotation::link_end(),
            has_outputs: true,
        }
    }

    /// Hooks for interfaces, whose inputs may be linked both ways
    pub fn interface() -> Self {
        Self {
            input_link: Annotation::link_start_and_end(),
            has_outputs: false,
        }
    }
}

impl ObjectHooks for ScriptHooks {
    fn uri_properties(&self) -> &'static [&'static str] {
        &["uri"]
    }

    fn sync(&self, object: &mut EditorObject, reason: &SyncReason, env: &mut HookEnv<'_>) {
        if !reason.touches("uri") {
            return;
        }
        let source = match read_uri(object, "uri", env) {
            Ok(source) => {
                env.clear(&name_path("uri"), ErrorCategory::FileLoad);
                source
            }
            Err(message) => {
                env.report(&name_path("uri"), ErrorCategory::FileLoad, ErrorLevel::Error, message);
                return;
            }
        };
        let interface = match source.map(|s| env.engine.parse_script(&s)) {
            None => Default::default(),
            Some(Ok(interface)) => interface,
            Some(Err(message)) => {
                log::debug!("Script '{}' failed to parse: {}", object.name(), message);
                env.report(&[], ErrorCategory::ParseError, ErrorLevel::Error, message);
                return;
            }
        };
        env.clear(&[], ErrorCategory::ParseError);

        if let Some(inputs) = build_or_report(&interface.inputs, &self.input_link, env) {
            replace_table(object, "inputs", inputs);
        }
        if self.has_outputs {
            if let Some(outputs) = build_or_report(&interface.outputs, &Annotation::link_start(), env) {
                replace_table(object, "outputs", outputs);
            }
        }
    }
}

/// Materials: parse both shaders into `uniforms`
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialHooks;

impl ObjectHooks for MaterialHooks {
    fn uri_properties(&self) -> &'static [&'static str] {
        &["uriVertex", "uriFragment"]
    }

    fn sync(&self, object: &mut EditorObject, reason: &SyncReason, env: &mut HookEnv<'_>) {
        if !reason.touches("uriVertex") && !reason.touches("uriFragment") {
            return;
        }
        let mut sources = Vec::new();
        for property in self.uri_properties() {
            match read_uri(object, property, env) {
                Ok(source) => {
                    env.clear(&name_path(property), ErrorCategory::FileLoad);
                    sources.push(source);
                }
                Err(message) => {
                    env.report(&name_path(property), ErrorCategory::FileLoad, ErrorLevel::Error, message);
                    return;
                }
            }
        }
        let uniforms = match (&sources[0], &sources[1]) {
            (Some(vertex), Some(fragment)) => match env.engine.parse_shader(vertex, fragment) {
                Ok(uniforms) => uniforms,
                Err(message) => {
                    env.report(&[], ErrorCategory::ParseError, ErrorLevel::Error, message);
                    return;
                }
            },
            _ => Vec::new(),
        };
        env.clear(&[], ErrorCategory::ParseError);
        if let Some(table) = build_or_report(&uniforms, &Annotation::link_end(), env) {
            replace_table(object, "uniforms", table);
        }
    }
}

/// Meshes and textures: check the file through the resource cache
#[derive(Debug, Clone, Copy)]
pub struct ResourceHooks {
    kind: ResourceKind,
}

impl ResourceHooks {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

impl ObjectHooks for ResourceHooks {
    fn uri_properties(&self) -> &'static [&'static str] {
        &["uri"]
    }

    fn sync(&self, object: &mut EditorObject, reason: &SyncReason, env: &mut HookEnv<'_>) {
        if !reason.touches("uri") {
            return;
        }
        let uri = object.value("uri").and_then(Value::as_str).unwrap_or_default();
        let path = name_path("uri");
        let Some(file) = env.resolve_uri(uri) else {
            env.clear(&path, ErrorCategory::FileLoad);
            env.clear(&path, ErrorCategory::ResourceInfo);
            return;
        };
        if let SyncReason::FileChanged(_) = reason {
            env.resources.invalidate(&file);
        }
        match env.resources.load(&file, self.kind) {
            Ok(info) => env.report(&path, ErrorCategory::ResourceInfo, ErrorLevel::Info, info.description),
            Err(message) => env.report(&path, ErrorCategory::FileLoad, ErrorLevel::Error, message),
        }
    }
}
