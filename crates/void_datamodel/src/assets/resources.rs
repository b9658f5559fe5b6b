//! Resource cache collaborator
//!
//! Mesh and image decoding happen outside the data model. Hooks only ask a
//! [`ResourceCache`] whether a file can be loaded and record the answer as
//! an error item on the object.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Kind of resource a hook asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Mesh,
    Image,
}

/// Summary of a loaded resource, shown to the user as information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub description: String,
}

/// Loads external resources by absolute path
pub trait ResourceCache: Send + Sync {
    /// Load or fetch a cached resource; failure carries a readable reason
    fn load(&self, path: &Path, kind: ResourceKind) -> Result<ResourceInfo, String>;

    /// Forget a cached entry after the file changed
    fn invalidate(&self, path: &Path);
}

/// Cache that checks files on disk and remembers their size
#[derive(Debug, Default)]
pub struct FileResourceCache {
    entries: Mutex<HashMap<(PathBuf, ResourceKind), ResourceInfo>>,
}

impl FileResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl ResourceCache for FileResourceCache {
    fn load(&self, path: &Path, kind: ResourceKind) -> Result<ResourceInfo, String> {
        let key = (path.to_path_buf(), kind);
        if let Some(info) = self.entries.lock().get(&key) {
            return Ok(info.clone());
        }
        let metadata = std::fs::metadata(path).map_err(|e| format!("Cannot read {:?}: {}", path, e))?;
        if !metadata.is_file() {
            return Err(format!("{:?} is not a file", path));
        }
        let info = ResourceInfo {
            description: format!("{:?} {} bytes", kind, metadata.len()),
        };
        log::debug!("Loaded resource {:?}", path);
        self.entries.lock().insert(key, info.clone());
        Ok(info)
    }

    fn invalidate(&self, path: &Path) {
        self.entries.lock().retain(|(p, _), _| p != path);
    }
}
