// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiled program cache and include change tracking.

use crate::connection::Connection;
use crate::graph::Graph;
use crate::include::IncludeLoader;
use crate::node::Node;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::time::SystemTime;

/// Canonical description of a graph's topology, parameters and output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap a raw key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for previewing `port` of a graph already reduced to a subgraph
    pub fn preview(port: &str, subgraph: &CacheKey) -> Self {
        let mut key = String::from("preview:");
        push_field(&mut key, port);
        let _ = write!(key, ":{}", subgraph.0);
        Self(key)
    }

    /// The key text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append a free-text field as `{byte length}:{text}` so separators inside it
/// cannot be confused with the key's own.
fn push_field(key: &mut String, text: &str) {
    let _ = write!(key, "{}:{}", text.len(), text);
}

/// Derive the cache key of a graph.
///
/// Nodes are listed by ascending id with their parameters in name order,
/// connections by their target input, then the output designation. Two
/// graphs that differ only in insertion order get the same key. Names and
/// values are length-prefixed, so distinct graphs never share a key.
pub fn cache_key(graph: &Graph) -> CacheKey {
    let mut key = String::new();

    let mut nodes: Vec<&Node> = graph.nodes().collect();
    nodes.sort_by_key(|node| node.id);
    for node in nodes {
        let _ = write!(key, "{}:", node.id);
        push_field(&mut key, &node.module_type);
        for (name, value) in &node.parameters {
            key.push(';');
            push_field(&mut key, name);
            key.push('=');
            push_field(&mut key, value);
        }
        key.push('|');
    }

    key.push('#');
    let mut connections: Vec<&Connection> = graph.connections().collect();
    connections.sort_by(|a, b| (a.to_node, &a.to_port).cmp(&(b.to_node, &b.to_port)));
    for c in connections {
        let _ = write!(key, "{}.", c.from_node);
        push_field(&mut key, &c.from_port);
        let _ = write!(key, "->{}.", c.to_node);
        push_field(&mut key, &c.to_port);
        key.push('|');
    }

    key.push('#');
    if let Some(output) = graph.output() {
        let _ = write!(key, "{}.", output.node);
        push_field(&mut key, &output.port);
    }

    CacheKey(key)
}

/// A compiled program and what it was built from
#[derive(Debug, Clone)]
pub struct CacheEntry<A> {
    /// Key the entry is stored under
    pub key: CacheKey,
    /// Backend artifact
    pub artifact: A,
    /// Generated fragment source
    pub source_text: String,
    /// Include files the source was built from
    pub includes: Vec<String>,
}

impl<A> CacheEntry<A> {
    /// Whether the entry was built from `include`
    pub fn uses_include(&self, include: &str) -> bool {
        self.includes.iter().any(|i| i == include)
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Live entries
    pub entries: usize,
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries dropped because an include changed
    pub invalidations: u64,
}

/// Cache of compiled programs by key
#[derive(Debug)]
pub struct CompilationCache<A> {
    entries: HashMap<CacheKey, CacheEntry<A>>,
    hits: u64,
    misses: u64,
    invalidations: u64,
}

impl<A> Default for CompilationCache<A> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            invalidations: 0,
        }
    }
}

impl<A> CompilationCache<A> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry, counting the hit or miss
    pub fn get(&mut self, key: &CacheKey) -> Option<&CacheEntry<A>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Whether an entry exists, without counting
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store an entry, replacing any previous one
    pub fn put(&mut self, entry: CacheEntry<A>) {
        self.entries.insert(entry.key.clone(), entry);
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<A>> {
        self.entries.remove(key)
    }

    /// Keys of entries built from `include`, sorted
    pub fn keys_using(&self, include: &str) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .entries
            .values()
            .filter(|entry| entry.uses_include(include))
            .map(|entry| entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop every entry built from `include`
    pub fn invalidate_including(&mut self, include: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.uses_include(include));
        let removed = before - self.entries.len();
        self.invalidations += removed as u64;
        if removed > 0 {
            tracing::debug!("Invalidated {} cached programs using {}", removed, include);
        }
        removed
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            invalidations: self.invalidations,
        }
    }
}

/// Remembers include modification times and reports which ones changed
#[derive(Debug, Default)]
pub struct IncludeWatcher {
    timestamps: HashMap<String, Option<SystemTime>>,
}

impl IncludeWatcher {
    /// Create an empty watcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `path` at its current timestamp. Already tracked paths keep theirs.
    pub fn track(&mut self, path: &str, loader: &dyn IncludeLoader) {
        if !self.timestamps.contains_key(path) {
            self.timestamps.insert(path.to_string(), loader.modified(path));
        }
    }

    /// Track several paths
    pub fn track_all<'a>(&mut self, paths: impl IntoIterator<Item = &'a String>, loader: &dyn IncludeLoader) {
        for path in paths {
            self.track(path, loader);
        }
    }

    /// Stop tracking a path
    pub fn untrack(&mut self, path: &str) -> bool {
        self.timestamps.remove(path).is_some()
    }

    /// Whether a path is tracked
    pub fn is_tracked(&self, path: &str) -> bool {
        self.timestamps.contains_key(path)
    }

    /// Number of tracked paths
    pub fn tracked_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Forget every path
    pub fn clear(&mut self) {
        self.timestamps.clear();
    }

    /// Paths whose timestamp changed since the last poll, sorted.
    ///
    /// A file that appears or disappears counts as changed.
    pub fn poll(&mut self, loader: &dyn IncludeLoader) -> Vec<String> {
        let mut changed = Vec::new();

        for (path, last) in &mut self.timestamps {
            let current = loader.modified(path);
            if current != *last {
                tracing::debug!("Include changed: {}", path);
                *last = current;
                changed.push(path.clone());
            }
        }

        changed.sort();
        changed
    }
}
