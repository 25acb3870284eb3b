// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hot reload loop.
//!
//! Watches the include library and the graph document. Library changes are
//! confirmed against the compiler's tracked timestamps before anything is
//! recompiled; a graph document change always recompiles.

use crate::file_watcher::{FileEvent, FileWatcher, FileWatcherConfig};
use crate::session::{CompileSummary, ShaderSession};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Statistics for hot reload operations
#[derive(Debug, Clone, Default)]
pub struct HotReloadStats {
    /// Successful recompiles
    pub recompiles: usize,
    /// Recompiles that failed
    pub failed: usize,
    /// Include files reported changed by the compiler
    pub include_changes: usize,
    /// Graph document reloads
    pub graph_reloads: usize,
    /// Last reload time
    pub last_reload: Option<Instant>,
}

/// What a batch of file events touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Touched {
    library: bool,
    graph: bool,
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Recompiles a session when its inputs change
pub struct HotReloader {
    session: ShaderSession,
    watcher: Option<FileWatcher>,
    graph_path: PathBuf,
    include_root: PathBuf,
    stats: Arc<RwLock<HotReloadStats>>,
}

impl HotReloader {
    /// Create a reloader without a file watcher; feed it with [`Self::handle_events`]
    pub fn new(session: ShaderSession) -> Self {
        let graph_path = canonical(&session.request().graph_path);
        let include_root = canonical(&session.config().include_root);

        Self {
            session,
            watcher: None,
            graph_path,
            include_root,
            stats: Arc::new(RwLock::new(HotReloadStats::default())),
        }
    }

    /// Start watching the include library and the graph document
    pub fn start_watching(&mut self) -> Result<(), notify::Error> {
        let config = self.session.config();
        let mut watcher = FileWatcher::new(FileWatcherConfig::for_shaders(
            config.debounce(),
            &config.include_extensions,
        ))?;

        if self.include_root.is_dir() {
            watcher.watch_directory(&self.include_root)?;
        } else {
            tracing::warn!("Include root {:?} does not exist, not watching it", self.include_root);
        }
        if !watcher.is_watching(&self.graph_path) {
            watcher.watch_file(&self.graph_path)?;
        }

        self.watcher = Some(watcher);
        Ok(())
    }

    /// Shared handle to the statistics
    pub fn stats(&self) -> Arc<RwLock<HotReloadStats>> {
        Arc::clone(&self.stats)
    }

    fn classify(&self, events: &[FileEvent]) -> Touched {
        let mut touched = Touched::default();
        for event in events {
            let Some(path) = event.path() else {
                tracing::warn!("File watcher reported: {:?}", event);
                continue;
            };
            let path = canonical(path);
            if path == self.graph_path {
                touched.graph = true;
            } else if path.starts_with(&self.include_root) {
                touched.library = true;
            }
        }
        touched
    }

    /// React to a batch of file events. Returns the recompile result if one ran.
    pub fn handle_events(&mut self, events: &[FileEvent]) -> Option<CompileSummary> {
        let touched = self.classify(events);

        let mut changed_includes = Vec::new();
        if touched.library {
            changed_includes = self.session.check_includes();
        }
        if changed_includes.is_empty() && !touched.graph {
            return None;
        }

        {
            let mut stats = self.stats.write();
            stats.include_changes += changed_includes.len();
            if touched.graph {
                stats.graph_reloads += 1;
            }
        }

        let result = self.session.compile_once();
        let mut stats = self.stats.write();
        stats.last_reload = Some(Instant::now());
        match result {
            Ok(summary) => {
                stats.recompiles += 1;
                tracing::info!("Hot reloaded {:?}", summary.output_path);
                Some(summary)
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!("Hot reload failed: {}", e);
                None
            }
        }
    }

    /// Drain watcher events until `running` is cleared or the watcher goes away.
    ///
    /// Returns the final statistics.
    pub fn run(&mut self, running: &AtomicBool) -> HotReloadStats {
        let interval = self.session.config().poll_interval();
        tracing::info!("Watching for changes, poll interval {:?}", interval);

        while running.load(Ordering::Relaxed) {
            let Some(watcher) = &self.watcher else {
                tracing::warn!("No file watcher running");
                break;
            };
            let events = watcher.poll_events();
            if watcher.is_disconnected() {
                break;
            }
            if !events.is_empty() {
                self.handle_events(&events);
            }
            std::thread::sleep(interval);
        }

        let stats = self.stats.read().clone();
        tracing::info!(
            "Watch stopped: {} recompiles, {} failed, {} include changes, {} graph reloads, {} cache hits",
            stats.recompiles,
            stats.failed,
            stats.include_changes,
            stats.graph_reloads,
            self.session.stats().cache_hits
        );
        stats
    }
}
