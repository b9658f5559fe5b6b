//! File system watcher for hot-reload of referenced files
//!
//! Watches the parent directory of every registered file, because editors
//! often replace a file instead of writing it in place. Events are filtered
//! to the registered files, debounced, and posted through a
//! [`FileChangeSender`] from the notify thread.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "file-watcher")]
use notify::{Event, EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use void_core::{FileChange, FileChangeKind, FileChangeSender, FileWatcher, WatchError};

/// Registered files and the last time each one fired
#[derive(Debug, Default)]
struct WatchState {
    files: BTreeSet<PathBuf>,
    debounce: HashMap<PathBuf, Instant>,
}

impl WatchState {
    /// Turn a raw event path into a change, unless it is unregistered or
    /// fired within `window`
    fn accept(&mut self, path: PathBuf, kind: FileChangeKind, window: Duration, now: Instant) -> Option<FileChange> {
        if !self.files.contains(&path) {
            return None;
        }
        if let Some(last) = self.debounce.get(&path) {
            if now.duration_since(*last) < window {
                return None;
            }
        }
        self.debounce.insert(path.clone(), now);
        self.debounce.retain(|_, time| now.duration_since(*time) < Duration::from_secs(5));
        Some(FileChange::new(path, kind))
    }
}

/// [`FileWatcher`] backed by the platform's notification API
pub struct NotifyWatcher {
    #[cfg(feature = "file-watcher")]
    watcher: notify::RecommendedWatcher,
    state: Arc<Mutex<WatchState>>,
    /// Watched directories with the number of files registered in each
    dirs: BTreeMap<PathBuf, usize>,
}

impl NotifyWatcher {
    /// Create a watcher posting to `sender`
    #[cfg(feature = "file-watcher")]
    pub fn new(sender: FileChangeSender, debounce: Duration) -> Result<Self, WatchError> {
        let state = Arc::new(Mutex::new(WatchState::default()));
        let shared = state.clone();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("File watcher error: {}", e);
                    return;
                }
            };
            let kind = match event.kind {
                EventKind::Create(_) => FileChangeKind::Created,
                EventKind::Modify(_) => FileChangeKind::Modified,
                EventKind::Remove(_) => FileChangeKind::Deleted,
                _ => return,
            };
            let now = Instant::now();
            for path in event.paths {
                let change = shared.lock().accept(path, kind, debounce, now);
                if let Some(change) = change {
                    sender.send(change);
                }
            }
        })
        .map_err(|e| WatchError::Unavailable(e.to_string()))?;

        Ok(Self {
            watcher,
            state,
            dirs: BTreeMap::new(),
        })
    }

    /// Create a watcher (never fires without the file-watcher feature)
    #[cfg(not(feature = "file-watcher"))]
    pub fn new(_sender: FileChangeSender, _debounce: Duration) -> Result<Self, WatchError> {
        Ok(Self {
            state: Arc::new(Mutex::new(WatchState::default())),
            dirs: BTreeMap::new(),
        })
    }

    /// Get the watched directories
    pub fn watch_dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.keys().map(PathBuf::as_path)
    }

    #[cfg(feature = "file-watcher")]
    fn watch_dir(&mut self, dir: &Path) -> Result<(), WatchError> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::WatchFailed {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })
    }

    #[cfg(not(feature = "file-watcher"))]
    fn watch_dir(&mut self, _dir: &Path) -> Result<(), WatchError> {
        Ok(())
    }

    #[cfg(feature = "file-watcher")]
    fn unwatch_dir(&mut self, dir: &Path) {
        if let Err(e) = self.watcher.unwatch(dir) {
            log::debug!("Unwatching {:?} failed: {}", dir, e);
        }
    }

    #[cfg(not(feature = "file-watcher"))]
    fn unwatch_dir(&mut self, _dir: &Path) {}
}

impl FileWatcher for NotifyWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        if !self.state.lock().files.insert(path.to_path_buf()) {
            return Ok(());
        }
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let count = self.dirs.get(&dir).copied().unwrap_or(0);
        if count == 0 {
            if let Err(e) = self.watch_dir(&dir) {
                self.state.lock().files.remove(path);
                return Err(e);
            }
            log::debug!("Watching directory: {:?}", dir);
        }
        self.dirs.insert(dir, count + 1);
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) {
        if !self.state.lock().files.remove(path) {
            return;
        }
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        match self.dirs.get_mut(&dir) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.dirs.remove(&dir);
                self.unwatch_dir(&dir);
            }
            None => {}
        }
    }
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher").field("dirs", &self.dirs).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_filters_and_debounces() {
        let mut state = WatchState::default();
        state.files.insert(PathBuf::from("/p/a.lua"));
        let now = Instant::now();
        let window = Duration::from_millis(100);

        assert!(state
            .accept(PathBuf::from("/p/b.lua"), FileChangeKind::Modified, window, now)
            .is_none());
        let change = state
            .accept(PathBuf::from("/p/a.lua"), FileChangeKind::Modified, window, now)
            .unwrap();
        assert_eq!(change, FileChange::modified("/p/a.lua"));
        assert!(state
            .accept(PathBuf::from("/p/a.lua"), FileChangeKind::Modified, window, now)
            .is_none());
        assert!(state
            .accept(
                PathBuf::from("/p/a.lua"),
                FileChangeKind::Modified,
                window,
                now + Duration::from_millis(150)
            )
            .is_some());
    }

    #[test]
    fn test_directories_are_reference_counted() {
        let dir = tempfile::tempdir().unwrap();
        let queue = void_core::FileChangeQueue::new();
        let mut watcher = NotifyWatcher::new(queue.sender(), Duration::from_millis(10)).unwrap();
        let a = dir.path().join("a.lua");
        let b = dir.path().join("b.lua");

        watcher.watch(&a).unwrap();
        watcher.watch(&b).unwrap();
        assert_eq!(watcher.watch_dirs().count(), 1);
        watcher.unwatch(&a);
        assert_eq!(watcher.watch_dirs().count(), 1);
        watcher.unwatch(&b);
        assert_eq!(watcher.watch_dirs().count(), 0);
    }
}
