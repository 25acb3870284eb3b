// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader node graph compiler.
//!
//! This crate turns a graph of reusable shading modules into a single GLSL
//! program:
//! - Typed module ports and a registry of module types
//! - Graph editing with validation, ordering and subgraph extraction
//! - Code generation with recursive include resolution
//! - A compilation cache invalidated by include changes
//!
//! ## Architecture
//!
//! A [`ModuleRegistry`] is built once and shared by every [`Graph`] and the
//! [`ShaderCompiler`]. The compiler validates a graph, derives a cache key,
//! and on a miss runs the [`CodeGenerator`] and submits the result to a
//! [`ShaderBackend`].

pub mod cache;
pub mod codegen;
pub mod compiler;
pub mod connection;
pub mod document;
pub mod graph;
pub mod include;
pub mod module;
pub mod modules;
pub mod node;
pub mod port;
pub mod registry;
pub mod validation;

pub use cache::{cache_key, CacheKey, CompilationCache, IncludeWatcher};
pub use codegen::{CodeGenerator, CodegenError, CodegenOptions, CompileTarget, GeneratedShader};
pub use compiler::{
    CompileError, CompileOutput, CompilerOptions, CompilerStats, ProgramHandle, ShaderBackend,
    ShaderCompiler, SourceBackend,
};
pub use connection::{Connection, ConnectionId};
pub use document::{DocumentError, GraphDocument};
pub use graph::{CycleError, Graph, GraphError, OutputTarget};
pub use include::{FsIncludeLoader, IncludeError, IncludeLoader, IncludeResolver, MemoryIncludeLoader};
pub use module::{ModuleCategory, ModuleDefinition, PortBindings, ShaderModule};
pub use node::{Node, NodeId};
pub use port::{DataType, Port, PortDirection};
pub use registry::{ModuleRegistry, RegistryError};
pub use validation::{ValidationError, ValidationReport, ValidationWarning};
