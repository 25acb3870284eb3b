// SPDX-License-Identifier: MIT OR Apache-2.0
//! Include library loading and recursive `#include` resolution.
//!
//! Modules name the library files they need by path. The resolver loads each
//! file through an [`IncludeLoader`], inlines its own `#include` directives
//! depth-first (dependencies before dependents) and emits every file at most
//! once per resolution, so mutual references terminate.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Extensions considered library files by [`FsIncludeLoader::available_modules`]
pub const DEFAULT_INCLUDE_EXTENSIONS: &[&str] = &["glsl", "frag", "vert", "wgsl"];

/// Prefix some libraries put in front of their own paths
const LIBRARY_PREFIX: &str = "lygia/";

/// Error when loading an include
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    /// No file at that path
    #[error("Include not found: {0}")]
    NotFound(String),

    /// The file exists but could not be read
    #[error("Failed to read include {path}: {source}")]
    Io {
        /// Include path
        path: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Source of include file contents
pub trait IncludeLoader: Send + Sync {
    /// Load the contents of a library file
    fn load(&self, path: &str) -> Result<String, IncludeError>;

    /// Last modification time, `None` if the file is missing
    fn modified(&self, path: &str) -> Option<SystemTime>;
}

// ============================================================================
// File system loader
// ============================================================================

/// Loads includes from a directory on disk
#[derive(Debug, Clone)]
pub struct FsIncludeLoader {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FsIncludeLoader {
    /// Create a loader rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_INCLUDE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Replace the extensions listed by [`Self::available_modules`]
    pub fn with_extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Library root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Every library file under the root, as sorted `/`-separated relative paths
    pub fn available_modules(&self) -> Vec<String> {
        let mut modules: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
            })
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                let parts: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();

        modules.sort();
        tracing::debug!("Discovered {} library modules in {:?}", modules.len(), self.root);
        modules
    }
}

impl IncludeLoader for FsIncludeLoader {
    fn load(&self, path: &str) -> Result<String, IncludeError> {
        std::fs::read_to_string(self.full_path(path)).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                IncludeError::NotFound(path.to_string())
            } else {
                IncludeError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        })
    }

    fn modified(&self, path: &str) -> Option<SystemTime> {
        std::fs::metadata(self.full_path(path))
            .and_then(|m| m.modified())
            .ok()
    }
}

// ============================================================================
// In-memory loader
// ============================================================================

#[derive(Debug, Default)]
struct MemoryLibrary {
    files: HashMap<String, (String, u64)>,
    next_version: u64,
}

/// In-memory include library.
///
/// Clones share the same files. Every write bumps a version stamp that is
/// reported as the modification time.
#[derive(Debug, Clone, Default)]
pub struct MemoryIncludeLoader {
    library: Arc<RwLock<MemoryLibrary>>,
}

impl MemoryIncludeLoader {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        let mut library = self.library.write();
        library.next_version += 1;
        let version = library.next_version;
        library.files.insert(path.into(), (content.into(), version));
    }

    /// Remove a file
    pub fn remove(&self, path: &str) -> bool {
        self.library.write().files.remove(path).is_some()
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.library.read().files.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.library.read().files.is_empty()
    }
}

impl IncludeLoader for MemoryIncludeLoader {
    fn load(&self, path: &str) -> Result<String, IncludeError> {
        self.library
            .read()
            .files
            .get(path)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| IncludeError::NotFound(path.to_string()))
    }

    fn modified(&self, path: &str) -> Option<SystemTime> {
        self.library
            .read()
            .files
            .get(path)
            .map(|(_, version)| SystemTime::UNIX_EPOCH + Duration::from_secs(*version))
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Normalize an include path written inside `including`.
///
/// The library prefix is dropped. Paths starting with `./` or `../` are
/// resolved against the including file's directory; anything else is
/// relative to the library root.
pub fn normalize_include_path(including: &str, target: &str) -> String {
    let target = target.trim();
    let target = target.strip_prefix(LIBRARY_PREFIX).unwrap_or(target);

    let mut segments: Vec<&str> = Vec::new();
    if target.starts_with("./") || target.starts_with("../") {
        if let Some((dir, _)) = including.rsplit_once('/') {
            segments.extend(dir.split('/').filter(|s| !s.is_empty()));
        }
    }

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Extract the path from an `#include "path"` or `#include <path>` line
pub fn parse_include_directive(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("#include")?.trim_start();
    let close = match rest.chars().next()? {
        '"' => '"',
        '<' => '>',
        _ => return None,
    };
    let inner = &rest[1..];
    let end = inner.find(close)?;
    Some(&inner[..end])
}

/// Output of [`IncludeResolver::resolve`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIncludes {
    /// Concatenated include bodies with directives inlined
    pub source: String,
    /// Every file that was loaded, in emission order
    pub files: Vec<String>,
    /// Files that could not be loaded
    pub missing: Vec<String>,
}

/// Recursive include resolver with a module-content cache keyed by path
pub struct IncludeResolver {
    loader: Box<dyn IncludeLoader>,
    module_cache: HashMap<String, String>,
}

impl IncludeResolver {
    /// Create a resolver over a loader
    pub fn new(loader: impl IncludeLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            module_cache: HashMap::new(),
        }
    }

    /// The underlying loader
    pub fn loader(&self) -> &dyn IncludeLoader {
        self.loader.as_ref()
    }

    /// Load a file, using the module-content cache
    pub fn load_module(&mut self, path: &str) -> Result<String, IncludeError> {
        if let Some(content) = self.module_cache.get(path) {
            return Ok(content.clone());
        }

        let content = self.loader.load(path)?;
        self.module_cache.insert(path.to_string(), content.clone());
        Ok(content)
    }

    /// Drop a cached file so the next load reads it again
    pub fn invalidate(&mut self, path: &str) -> bool {
        self.module_cache.remove(path).is_some()
    }

    /// Drop every cached file
    pub fn clear_cache(&mut self) {
        self.module_cache.clear();
    }

    /// Whether a file's content is cached
    pub fn is_cached(&self, path: &str) -> bool {
        self.module_cache.contains_key(path)
    }

    /// Resolve a set of top-level includes into one source block
    pub fn resolve<'a>(&mut self, paths: impl IntoIterator<Item = &'a str>) -> ResolvedIncludes {
        let mut processed = HashSet::new();
        let mut resolved = ResolvedIncludes::default();

        for path in paths {
            let path = normalize_include_path("", path);
            self.resolve_into(&path, &mut processed, &mut resolved);
        }

        resolved
    }

    fn resolve_into(&mut self, path: &str, processed: &mut HashSet<String>, out: &mut ResolvedIncludes) {
        if !processed.insert(path.to_string()) {
            return;
        }

        let content = match self.load_module(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Could not load include {}: {}", path, e);
                out.missing.push(path.to_string());
                out.source.push_str(&format!("// Include not found: {path}\n"));
                return;
            }
        };

        let mut body = String::with_capacity(content.len());
        for line in content.lines() {
            match parse_include_directive(line) {
                Some(target) => {
                    let dependency = normalize_include_path(path, target);
                    self.resolve_into(&dependency, processed, out);
                }
                None => {
                    body.push_str(line);
                    body.push('\n');
                }
            }
        }

        out.files.push(path.to_string());
        out.source.push_str(&format!("// Include: {path}\n"));
        out.source.push_str(&body);
    }
}

impl std::fmt::Debug for IncludeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncludeResolver")
            .field("cached_modules", &self.module_cache.len())
            .finish_non_exhaustive()
    }
}
