// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debounced file system watcher for the include library and graph files.

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// A file was created or modified
    Changed(PathBuf),
    /// A file was deleted
    Removed(PathBuf),
    /// The watcher reported an error
    Error(String),
}

impl FileEvent {
    /// Path the event is about
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Changed(path) | Self::Removed(path) => Some(path),
            Self::Error(_) => None,
        }
    }
}

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct FileWatcherConfig {
    /// Debounce duration for events
    pub debounce_duration: Duration,
    /// File extensions to report (empty = all)
    pub extensions: HashSet<String>,
}

impl Default for FileWatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(250),
            extensions: HashSet::new(),
        }
    }
}

impl FileWatcherConfig {
    /// Watch library files plus graph documents
    pub fn for_shaders(debounce_duration: Duration, include_extensions: &[String]) -> Self {
        let mut extensions: HashSet<String> =
            include_extensions.iter().map(|e| e.to_lowercase()).collect();
        extensions.insert("ron".to_string());

        Self {
            debounce_duration,
            extensions,
        }
    }

    /// Whether events for `path` should be reported
    pub fn accepts(&self, path: &Path) -> bool {
        self.extensions.is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.extensions.contains(&e.to_lowercase()))
    }
}

/// Translate one debounced notify event into our events
fn translate(kind: &EventKind, paths: &[PathBuf], config: &FileWatcherConfig) -> Vec<FileEvent> {
    let accepted = paths.iter().filter(|p| config.accepts(p)).cloned();
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => accepted.map(FileEvent::Changed).collect(),
        EventKind::Remove(_) => accepted.map(FileEvent::Removed).collect(),
        EventKind::Any | EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

/// File system watcher feeding an mpsc channel drained by [`FileWatcher::poll_events`]
pub struct FileWatcher {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    event_rx: Receiver<FileEvent>,
    watched: Arc<RwLock<HashSet<PathBuf>>>,
    disconnected: AtomicBool,
}

impl FileWatcher {
    /// Create a new file watcher with the given configuration
    pub fn new(config: FileWatcherConfig) -> Result<Self, notify::Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let debounce = config.debounce_duration;

        let debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        for file_event in translate(&event.kind, &event.paths, &config) {
                            let _ = event_tx.send(file_event);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = event_tx.send(FileEvent::Error(error.to_string()));
                    }
                }
            }
        })?;

        Ok(Self {
            debouncer,
            event_rx,
            watched: Arc::new(RwLock::new(HashSet::new())),
            disconnected: AtomicBool::new(false),
        })
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<(), notify::Error> {
        self.watch(path.as_ref(), RecursiveMode::Recursive)
    }

    /// Watch a single file
    pub fn watch_file(&mut self, path: impl AsRef<Path>) -> Result<(), notify::Error> {
        self.watch(path.as_ref(), RecursiveMode::NonRecursive)
    }

    fn watch(&mut self, path: &Path, mode: RecursiveMode) -> Result<(), notify::Error> {
        self.debouncer.watch(path, mode)?;
        self.watched.write().insert(path.to_path_buf());
        tracing::info!("Watching for changes: {:?}", path);
        Ok(())
    }

    /// Check if a path is being watched
    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched.read().contains(path)
    }

    /// Whether the debouncer has gone away; no further events will arrive
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }

    /// Poll for pending file events (non-blocking)
    pub fn poll_events(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected.swap(true, Ordering::Relaxed) {
                        tracing::warn!("File watcher channel disconnected");
                    }
                    break;
                }
            }
        }
        events
    }
}
