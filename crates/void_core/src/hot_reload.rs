//! Hot-reload notifications for external resource files
//!
//! File-system watchers run on their own threads. They never touch the
//! document; they push [`FileChange`] events into a [`FileChangeQueue`]
//! which the model thread drains at a point of its choosing.
//!
//! ## Architecture
//!
//! ```text
//! watcher thread(s)            model thread
//! ─────────────────            ────────────
//! FileChangeSender ──channel──► FileChangeQueue::drain() ──► reload hooks
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, Sender};

use crate::error::WatchError;

/// Type of file change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    /// File was created
    Created,
    /// File was modified
    Modified,
    /// File was deleted
    Deleted,
}

/// A file change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Path to the changed file
    pub path: PathBuf,
    /// Type of change
    pub kind: FileChangeKind,
}

impl FileChange {
    /// Create a new change event
    pub fn new(path: impl Into<PathBuf>, kind: FileChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Shorthand for a modification event
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FileChangeKind::Modified)
    }
}

/// A source of file change notifications.
///
/// Implementations deliver events through the [`FileChangeSender`] they were
/// created with and must be usable from the model thread only for
/// registration.
pub trait FileWatcher: Send {
    /// Start watching a file
    fn watch(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Stop watching a file
    fn unwatch(&mut self, path: &Path);
}

/// Cloneable, thread-safe handle used by watchers to post events
#[derive(Clone, Debug)]
pub struct FileChangeSender {
    tx: Sender<FileChange>,
}

impl FileChangeSender {
    /// Post an event; returns false if the queue was dropped
    pub fn send(&self, change: FileChange) -> bool {
        self.tx.send(change).is_ok()
    }
}

/// Queue that marshals file change events onto the model thread
#[derive(Debug)]
pub struct FileChangeQueue {
    tx: Sender<FileChange>,
    rx: Receiver<FileChange>,
}

impl Default for FileChangeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FileChangeQueue {
    /// Create a new empty queue
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Get a sender that can be moved to a watcher thread
    pub fn sender(&self) -> FileChangeSender {
        FileChangeSender {
            tx: self.tx.clone(),
        }
    }

    /// Check whether events are waiting
    pub fn has_pending(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Drain all pending events.
    ///
    /// Several events for the same path collapse into the last one; the
    /// result is ordered by path.
    pub fn drain(&self) -> Vec<FileChange> {
        let mut latest: BTreeMap<PathBuf, FileChangeKind> = BTreeMap::new();
        while let Ok(change) = self.rx.try_recv() {
            latest.insert(change.path, change.kind);
        }
        if !latest.is_empty() {
            log::debug!("Draining {} file change(s)", latest.len());
        }
        latest
            .into_iter()
            .map(|(path, kind)| FileChange { path, kind })
            .collect()
    }
}

/// Watcher that records registrations and lets callers post events by hand.
///
/// Useful in tests and in hosts that receive change notifications from
/// somewhere other than the local file system.
#[derive(Debug)]
pub struct MemoryFileWatcher {
    sender: FileChangeSender,
    watched: Vec<PathBuf>,
}

impl MemoryFileWatcher {
    /// Create a watcher posting to `sender`
    pub fn new(sender: FileChangeSender) -> Self {
        Self {
            sender,
            watched: Vec::new(),
        }
    }

    /// Get the currently watched paths
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Post a change for a watched path; unwatched paths are ignored
    pub fn trigger(&self, change: FileChange) -> bool {
        if self.watched.iter().any(|p| p == &change.path) {
            self.sender.send(change)
        } else {
            false
        }
    }
}

impl FileWatcher for MemoryFileWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        if !self.watched.iter().any(|p| p == path) {
            self.watched.push(path.to_path_buf());
        }
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) {
        self.watched.retain(|p| p != path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_collapses_duplicates() {
        let queue = FileChangeQueue::new();
        let sender = queue.sender();
        sender.send(FileChange::new("a.lua", FileChangeKind::Created));
        sender.send(FileChange::modified("a.lua"));
        sender.send(FileChange::modified("b.lua"));

        let changes = queue.drain();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], FileChange::modified("a.lua"));
        assert!(!queue.has_pending());
    }

    #[test]
    fn test_events_cross_threads() {
        let queue = FileChangeQueue::new();
        let sender = queue.sender();
        let handle = std::thread::spawn(move || {
            sender.send(FileChange::modified("mesh.gltf"));
        });
        handle.join().unwrap();
        assert_eq!(queue.drain(), vec![FileChange::modified("mesh.gltf")]);
    }

    #[test]
    fn test_memory_watcher_filters_unwatched() {
        let queue = FileChangeQueue::new();
        let mut watcher = MemoryFileWatcher::new(queue.sender());
        watcher.watch(Path::new("shader.vert")).unwrap();

        assert!(watcher.trigger(FileChange::modified("shader.vert")));
        assert!(!watcher.trigger(FileChange::modified("other.vert")));

        watcher.unwatch(Path::new("shader.vert"));
        assert!(watcher.watched().is_empty());
        assert_eq!(queue.drain().len(), 1);
    }
}
