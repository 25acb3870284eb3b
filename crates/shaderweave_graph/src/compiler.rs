// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compile entry point: validation, caching, code generation and submission.
//!
//! [`ShaderCompiler`] ties the pieces together. A compile request validates
//! the graph, derives its cache key and either returns the cached artifact or
//! generates source, hands it to the [`ShaderBackend`] and caches the result.
//! Include files used by each program are tracked so that
//! [`ShaderCompiler::check_for_changes`] can drop stale programs.

use crate::cache::{cache_key, CacheEntry, CacheKey, CacheStats, CompilationCache, IncludeWatcher};
use crate::codegen::{CodeGenerator, CodegenError, CodegenOptions, CompileTarget, GeneratedShader};
use crate::graph::{Graph, GraphError};
use crate::include::{IncludeLoader, IncludeResolver};
use crate::node::NodeId;
use crate::registry::ModuleRegistry;
use crate::validation::{ValidationError, ValidationWarning};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Callback fired with the path of each changed include
pub type ReloadCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Receives generated programs and turns them into artifacts
pub trait ShaderBackend {
    /// What a successful submission produces
    type Artifact: Clone;

    /// Build a program from generated source
    fn submit(&mut self, shader: &GeneratedShader) -> Result<Self::Artifact, String>;
}

/// Handle to a program held by [`SourceBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramHandle(pub u32);

impl fmt::Display for ProgramHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program#{}", self.0)
    }
}

/// Backend that keeps the submitted source and hands out handles
#[derive(Debug, Default)]
pub struct SourceBackend {
    next_handle: u32,
    programs: HashMap<ProgramHandle, GeneratedShader>,
}

impl SourceBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// The program behind a handle
    pub fn program(&self, handle: ProgramHandle) -> Option<&GeneratedShader> {
        self.programs.get(&handle)
    }

    /// Number of programs submitted
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }
}

impl ShaderBackend for SourceBackend {
    type Artifact = ProgramHandle;

    fn submit(&mut self, shader: &GeneratedShader) -> Result<ProgramHandle, String> {
        self.next_handle += 1;
        let handle = ProgramHandle(self.next_handle);
        self.programs.insert(handle, shader.clone());
        Ok(handle)
    }
}

/// Compiler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Code generation settings
    pub codegen: CodegenOptions,
    /// Record include timestamps so changes can be detected
    pub track_includes: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            codegen: CodegenOptions::default(),
            track_includes: true,
        }
    }
}

/// Compiler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompilerStats {
    /// Programs generated and submitted
    pub compilations: u64,
    /// Requests answered from the cache
    pub cache_hits: u64,
    /// Requests that had to compile
    pub cache_misses: u64,
    /// Include changes picked up
    pub hot_reloads: u64,
    /// Cached programs dropped by include changes
    pub invalidated_entries: u64,
}

/// Result of a successful compile request
#[derive(Debug, Clone)]
pub struct CompileOutput<A> {
    /// Key the program is cached under
    pub key: CacheKey,
    /// Backend artifact
    pub artifact: A,
    /// Generated fragment source
    pub fragment_source: String,
    /// Include files the program was built from
    pub includes: Vec<String>,
    /// Whether the artifact came from the cache
    pub from_cache: bool,
    /// Validation warnings for this request
    pub warnings: Vec<ValidationWarning>,
}

/// Error when compiling a graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// The graph has structural errors
    #[error("Graph validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// Code generation failed
    #[error(transparent)]
    Codegen(#[from] CodegenError),

    /// The preview subgraph could not be built
    #[error("Failed to extract subgraph: {0}")]
    Subgraph(#[from] GraphError),

    /// The backend rejected the program
    #[error("Backend rejected program: {0}")]
    Backend(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Graph compiler with caching and include hot reload
pub struct ShaderCompiler<B: ShaderBackend = SourceBackend> {
    registry: Arc<ModuleRegistry>,
    generator: CodeGenerator,
    resolver: IncludeResolver,
    cache: CompilationCache<B::Artifact>,
    watcher: IncludeWatcher,
    backend: B,
    options: CompilerOptions,
    stats: CompilerStats,
    reload_callback: Option<ReloadCallback>,
}

impl<B: ShaderBackend> ShaderCompiler<B> {
    /// Create a compiler
    pub fn new(
        registry: Arc<ModuleRegistry>,
        loader: impl IncludeLoader + 'static,
        backend: B,
        options: CompilerOptions,
    ) -> Self {
        Self {
            registry,
            generator: CodeGenerator::new(options.codegen.clone()),
            resolver: IncludeResolver::new(loader),
            cache: CompilationCache::new(),
            watcher: IncludeWatcher::new(),
            backend,
            options,
            stats: CompilerStats::default(),
            reload_callback: None,
        }
    }

    /// Compile a whole graph
    pub fn compile(&mut self, graph: &Graph) -> Result<CompileOutput<B::Artifact>, CompileError> {
        let warnings = Self::validated(graph)?;
        let key = cache_key(graph);
        self.compile_keyed(graph, key, warnings)
    }

    /// Compile only what `node_id` depends on, with that node as the output
    pub fn compile_preview(
        &mut self,
        graph: &Graph,
        node_id: NodeId,
    ) -> Result<CompileOutput<B::Artifact>, CompileError> {
        let subgraph = graph.extract_subgraph(node_id)?;
        let warnings = Self::validated(&subgraph)?;
        let port = subgraph.output().map(|o| o.port.as_str()).unwrap_or_default();
        let key = CacheKey::preview(port, &cache_key(&subgraph));
        self.compile_keyed(&subgraph, key, warnings)
    }

    fn validated(graph: &Graph) -> Result<Vec<ValidationWarning>, CompileError> {
        let report = graph.validate();
        if !report.is_valid() {
            tracing::warn!("Graph '{}' is invalid: {}", graph.name, join_errors(&report.errors));
            return Err(CompileError::Validation(report.errors));
        }
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
        Ok(report.warnings)
    }

    fn compile_keyed(
        &mut self,
        graph: &Graph,
        key: CacheKey,
        warnings: Vec<ValidationWarning>,
    ) -> Result<CompileOutput<B::Artifact>, CompileError> {
        if let Some(entry) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            tracing::debug!("Cache hit for '{}'", graph.name);
            return Ok(CompileOutput {
                key,
                artifact: entry.artifact.clone(),
                fragment_source: entry.source_text.clone(),
                includes: entry.includes.clone(),
                from_cache: true,
                warnings,
            });
        }
        self.stats.cache_misses += 1;

        let shader = self
            .generator
            .generate(graph, &self.registry, CompileTarget::Full, &mut self.resolver)?;
        let artifact = self.backend.submit(&shader).map_err(|e| {
            tracing::error!("Backend rejected '{}': {}", graph.name, e);
            CompileError::Backend(e)
        })?;

        if self.options.track_includes {
            self.watcher.track_all(&shader.includes, self.resolver.loader());
        }

        self.cache.put(CacheEntry {
            key: key.clone(),
            artifact: artifact.clone(),
            source_text: shader.fragment_source.clone(),
            includes: shader.includes.clone(),
        });
        self.stats.compilations += 1;

        tracing::info!(
            "Compiled '{}' ({} nodes, {} includes)",
            graph.name,
            shader.node_count,
            shader.includes.len()
        );

        Ok(CompileOutput {
            key,
            artifact,
            fragment_source: shader.fragment_source,
            includes: shader.includes,
            from_cache: false,
            warnings,
        })
    }

    /// Poll tracked includes and drop everything built from changed ones.
    ///
    /// Returns the changed paths.
    pub fn check_for_changes(&mut self) -> Vec<String> {
        let changed = self.watcher.poll(self.resolver.loader());

        for path in &changed {
            self.resolver.invalidate(path);
            let removed = self.cache.invalidate_including(path);
            self.stats.invalidated_entries += removed as u64;
            self.stats.hot_reloads += 1;

            tracing::info!("Hot reload: {} ({} programs invalidated)", path, removed);
            if let Some(callback) = &self.reload_callback {
                callback(path);
            }
        }

        changed
    }

    /// Set the callback fired for each changed include
    pub fn set_reload_callback(&mut self, callback: ReloadCallback) {
        self.reload_callback = Some(callback);
    }

    /// Compiler counters
    pub fn stats(&self) -> CompilerStats {
        self.stats
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop compiled programs, cached include contents and tracked timestamps
    pub fn clear_caches(&mut self) {
        self.cache.clear();
        self.resolver.clear_cache();
        self.watcher.clear();
        tracing::debug!("Cleared compiler caches");
    }

    /// The module registry
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// The include resolver
    pub fn resolver(&self) -> &IncludeResolver {
        &self.resolver
    }

    /// The backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Current options
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }
}

impl<B: ShaderBackend> fmt::Debug for ShaderCompiler<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderCompiler")
            .field("options", &self.options)
            .field("stats", &self.stats)
            .field("cached_programs", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include::MemoryIncludeLoader;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    fn registry() -> Arc<ModuleRegistry> {
        Arc::new(ModuleRegistry::with_builtin_modules())
    }

    fn library() -> MemoryIncludeLoader {
        let loader = MemoryIncludeLoader::new();
        loader.insert("math/mod289.glsl", "float mod289(float x) { return x; }\n");
        loader.insert(
            "generative/snoise.glsl",
            "#include \"../math/mod289.glsl\"\nfloat snoise(vec2 v) { return mod289(v.x); }\n",
        );
        loader
    }

    fn compiler(loader: MemoryIncludeLoader) -> ShaderCompiler {
        ShaderCompiler::new(registry(), loader, SourceBackend::new(), CompilerOptions::default())
    }

    fn noise_graph(compiler: &ShaderCompiler) -> Graph {
        let mut graph = Graph::new("Noise", Arc::clone(compiler.registry()));
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        graph.set_output(noise, "output");
        graph
    }

    #[test]
    fn test_second_compile_is_a_cache_hit() {
        let mut compiler = compiler(library());
        let graph = noise_graph(&compiler);

        let first = compiler.compile(&graph).unwrap();
        assert!(!first.from_cache);
        assert_eq!(compiler.stats().cache_hits, 0);

        let second = compiler.compile(&graph).unwrap();
        assert!(second.from_cache);
        assert_eq!(second.artifact, first.artifact);
        assert_eq!(second.fragment_source, first.fragment_source);

        let stats = compiler.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.compilations, 1);
        assert_eq!(compiler.backend().program_count(), 1);
    }

    #[test]
    fn test_parameter_change_recompiles() {
        let mut compiler = compiler(library());
        let mut graph = noise_graph(&compiler);
        compiler.compile(&graph).unwrap();

        graph
            .update_parameters(NodeId(1), BTreeMap::from([("scale".to_string(), "9.0".to_string())]))
            .unwrap();
        let output = compiler.compile(&graph).unwrap();
        assert!(!output.from_cache);
        assert!(output.fragment_source.contains("uv * 9.0"));
        assert_eq!(compiler.stats().compilations, 2);
    }

    #[test]
    fn test_invalid_graph_is_rejected() {
        let mut compiler = compiler(library());
        let graph = Graph::new("Empty", Arc::clone(compiler.registry()));

        let err = compiler.compile(&graph).unwrap_err();
        assert_eq!(err, CompileError::Validation(vec![ValidationError::NoOutput]));
        assert_eq!(err.to_string(), "Graph validation failed: No output node specified");
        assert_eq!(compiler.stats().compilations, 0);
    }

    #[test]
    fn test_warnings_are_reported() {
        let mut compiler = compiler(library());
        let mut graph = Graph::new("Blend", Arc::clone(compiler.registry()));
        let blend = graph.add_node("blend", BTreeMap::new()).unwrap();
        graph.set_output(blend, "output");

        let output = compiler.compile(&graph).unwrap();
        assert_eq!(output.warnings.len(), 2);
        assert!(output.fragment_source.contains("// Include not found: color/blend.glsl"));
    }

    #[test]
    fn test_include_change_invalidates() {
        let loader = library();
        let mut compiler = compiler(loader.clone());
        let graph = noise_graph(&compiler);

        let reloaded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reloaded);
        compiler.set_reload_callback(Box::new(move |path| sink.lock().push(path.to_string())));

        compiler.compile(&graph).unwrap();
        assert!(compiler.check_for_changes().is_empty());

        loader.insert("math/mod289.glsl", "float mod289(float x) { return x * 2.0; }\n");
        assert_eq!(compiler.check_for_changes(), vec!["math/mod289.glsl"]);
        assert_eq!(*reloaded.lock(), vec!["math/mod289.glsl".to_string()]);

        let stats = compiler.stats();
        assert_eq!(stats.hot_reloads, 1);
        assert_eq!(stats.invalidated_entries, 1);

        let output = compiler.compile(&graph).unwrap();
        assert!(!output.from_cache);
        assert!(output.fragment_source.contains("return x * 2.0;"));
        assert_eq!(compiler.stats().compilations, 2);
    }

    #[test]
    fn test_unrelated_include_change_keeps_entry() {
        let loader = library();
        loader.insert("color/blend.glsl", "vec3 blendNormal(vec3 b, vec3 o, float a) { return o; }\n");
        let mut compiler = compiler(loader.clone());
        let graph = noise_graph(&compiler);
        compiler.compile(&graph).unwrap();

        loader.insert("color/blend.glsl", "changed");
        assert!(compiler.check_for_changes().is_empty());
        assert!(compiler.compile(&graph).unwrap().from_cache);
    }

    #[test]
    fn test_preview_compile() {
        let mut compiler = compiler(library());
        let mut graph = Graph::new("Chain", Arc::clone(compiler.registry()));
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let color = graph.add_node("color", BTreeMap::new()).unwrap();
        let filter = graph.add_node("filter", BTreeMap::new()).unwrap();
        graph.add_connection(noise, "output", color, "value").unwrap();
        graph.add_connection(color, "output", filter, "input").unwrap();
        graph.set_output(filter, "output");

        let preview = compiler.compile_preview(&graph, noise).unwrap();
        assert!(preview.key.as_str().starts_with("preview:6:output:"));
        assert!(preview.fragment_source.contains("FragColor = vec4(vec3(node1_output), 1.0);"));
        assert!(!preview.fragment_source.contains("node2_func"));

        assert!(compiler.compile_preview(&graph, noise).unwrap().from_cache);
        assert_eq!(
            compiler.compile_preview(&graph, NodeId(40)).unwrap_err(),
            CompileError::Subgraph(GraphError::NodeNotFound(NodeId(40)))
        );
    }

    struct RejectingBackend;

    impl ShaderBackend for RejectingBackend {
        type Artifact = ();

        fn submit(&mut self, _shader: &GeneratedShader) -> Result<(), String> {
            Err("syntax error".to_string())
        }
    }

    #[test]
    fn test_backend_failure_is_not_cached() {
        let mut compiler = ShaderCompiler::new(
            registry(),
            library(),
            RejectingBackend,
            CompilerOptions::default(),
        );
        let mut graph = Graph::new("Noise", registry());
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        graph.set_output(noise, "output");

        assert_eq!(
            compiler.compile(&graph).unwrap_err(),
            CompileError::Backend("syntax error".to_string())
        );
        assert_eq!(compiler.cache_stats().entries, 0);
        assert_eq!(compiler.stats().compilations, 0);
    }

    #[test]
    fn test_clear_caches() {
        let mut compiler = compiler(library());
        let graph = noise_graph(&compiler);
        compiler.compile(&graph).unwrap();
        compiler.clear_caches();

        assert!(!compiler.compile(&graph).unwrap().from_cache);
        assert!(compiler.resolver().is_cached("generative/snoise.glsl"));
    }
}
