// SPDX-License-Identifier: MIT OR Apache-2.0
//! One compile pipeline: load the graph document, compile it, write the result.

use crate::config::AppConfig;
use shaderweave_graph::compiler::{CompileError, CompilerStats, ShaderCompiler, SourceBackend};
use shaderweave_graph::document::{DocumentError, GraphDocument};
use shaderweave_graph::include::FsIncludeLoader;
use shaderweave_graph::{Graph, ModuleRegistry, NodeId};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Error from a compile pass
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The graph document could not be loaded
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The graph could not be compiled
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The output could not be written
    #[error("Failed to write {path:?}: {source}")]
    Write {
        /// Output path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// What a session compiles and where it writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Graph document to compile
    pub graph_path: PathBuf,
    /// Compile only this node and its dependencies
    pub preview: Option<NodeId>,
    /// Output file, overriding the configured directory
    pub output: Option<PathBuf>,
}

/// Outcome of one compile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSummary {
    /// File the fragment source was written to
    pub output_path: PathBuf,
    /// Whether the program came from the cache
    pub from_cache: bool,
    /// Number of validation warnings
    pub warnings: usize,
}

/// Long-lived compile state for one graph document
pub struct ShaderSession {
    config: AppConfig,
    registry: Arc<ModuleRegistry>,
    compiler: ShaderCompiler<SourceBackend>,
    request: CompileRequest,
}

impl ShaderSession {
    /// Create a session
    pub fn new(config: AppConfig, registry: Arc<ModuleRegistry>, request: CompileRequest) -> Self {
        let loader = FsIncludeLoader::new(&config.include_root)
            .with_extensions(config.include_extensions.iter().cloned());
        let compiler = ShaderCompiler::new(
            Arc::clone(&registry),
            loader,
            SourceBackend::new(),
            config.compiler_options(),
        );

        Self {
            config,
            registry,
            compiler,
            request,
        }
    }

    /// Load the graph document
    pub fn load_graph(&self) -> Result<Graph, SessionError> {
        let document = GraphDocument::load_ron(&self.request.graph_path)?;
        let graph = Graph::from_document_with(
            &document,
            Arc::clone(&self.registry),
            self.config.strict_port_types,
        )?;
        Ok(graph)
    }

    /// Load, compile and write the graph
    pub fn compile_once(&mut self) -> Result<CompileSummary, SessionError> {
        let graph = self.load_graph()?;
        let output = match self.request.preview {
            Some(node) => self.compiler.compile_preview(&graph, node)?,
            None => self.compiler.compile(&graph)?,
        };

        let output_path = self
            .request
            .output
            .clone()
            .unwrap_or_else(|| self.config.output_path(&graph.name));
        write_output(&output_path, &output.fragment_source)?;

        tracing::info!(
            "Wrote {:?}{}",
            output_path,
            if output.from_cache { " (cached)" } else { "" }
        );

        Ok(CompileSummary {
            output_path,
            from_cache: output.from_cache,
            warnings: output.warnings.len(),
        })
    }

    /// Poll tracked includes, dropping stale programs. Returns the changed paths.
    pub fn check_includes(&mut self) -> Vec<String> {
        self.compiler.check_for_changes()
    }

    /// Compiler counters
    pub fn stats(&self) -> CompilerStats {
        self.compiler.stats()
    }

    /// The configuration in use
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The request being served
    pub fn request(&self) -> &CompileRequest {
        &self.request
    }
}

fn write_output(path: &Path, source: &str) -> Result<(), SessionError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, source)
    };
    write().map_err(|source| SessionError::Write {
        path: path.to_path_buf(),
        source,
    })
}
