// SPDX-License-Identifier: MIT OR Apache-2.0
//! GLSL code generation from a node graph.
//!
//! Every node becomes one function that writes its outputs through `out`
//! parameters. `main` declares one variable per node output, calls the node
//! functions in dependency order and writes the chosen output to `FragColor`.

use crate::graph::Graph;
use crate::include::IncludeResolver;
use crate::module::PortBindings;
use crate::modules::{TIME_VARIABLE, UV_VARIABLE};
use crate::node::{variable_name, Node, NodeId};
use crate::port::DataType;
use crate::registry::ModuleRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

/// GLSL version emitted when none is configured
pub const DEFAULT_GLSL_VERSION: &str = "410 core";

/// Sink statement used when the chosen output has no variable
const MISSING_OUTPUT: &str = "    FragColor = vec4(1.0, 0.0, 0.0, 1.0); // Error: missing output\n";

/// Sink statement used when the chosen output cannot become a color
const UNSUPPORTED_OUTPUT: &str = "    FragColor = vec4(1.0, 0.0, 1.0, 1.0); // Error: unsupported type\n";

/// Code generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenOptions {
    /// Value of the `#version` directive
    pub glsl_version: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            glsl_version: DEFAULT_GLSL_VERSION.to_string(),
        }
    }
}

/// What to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileTarget {
    /// All nodes, sink is the graph output
    Full,
    /// Only what a node depends on, sink is that node
    Preview(NodeId),
}

/// Generated program source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedShader {
    /// Fullscreen-quad vertex stage
    pub vertex_source: String,
    /// Fragment stage
    pub fragment_source: String,
    /// Every include file touched, sorted
    pub includes: Vec<String>,
    /// Includes that could not be loaded, sorted
    pub missing_includes: Vec<String>,
    /// Number of node functions emitted
    pub node_count: usize,
}

/// Error when generating code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    /// The graph has a cycle
    #[error("Cannot generate code for a cyclic graph")]
    Cycle,

    /// The preview node does not exist
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
}

/// A node output declared in `main`
struct OutputVariable {
    name: String,
    data_type: DataType,
}

/// GLSL code generator
#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    options: CodegenOptions,
}

impl CodeGenerator {
    /// Create a generator
    pub fn new(options: CodegenOptions) -> Self {
        Self { options }
    }

    /// Current options
    pub fn options(&self) -> &CodegenOptions {
        &self.options
    }

    /// Fullscreen-quad vertex stage
    pub fn vertex_source(&self) -> String {
        format!(
            "#version {}\n\n\
             layout (location = 0) in vec2 aPos;\n\
             layout (location = 1) in vec2 aTexCoord;\n\n\
             out vec2 TexCoord;\n\n\
             void main() {{\n    \
             gl_Position = vec4(aPos, 0.0, 1.0);\n    \
             TexCoord = aTexCoord;\n\
             }}\n",
            self.options.glsl_version
        )
    }

    /// Generate the program for `target`.
    ///
    /// Modules are created from `registry`; nodes whose type it does not know
    /// are replaced by a comment.
    pub fn generate(
        &self,
        graph: &Graph,
        registry: &ModuleRegistry,
        target: CompileTarget,
        resolver: &mut IncludeResolver,
    ) -> Result<GeneratedShader, CodegenError> {
        let (order, sink) = match target {
            CompileTarget::Full => {
                let order = graph.topological_order().map_err(|_| CodegenError::Cycle)?;
                let sink = graph.output().map(|o| (o.node, o.port.clone()));
                (order, sink)
            }
            CompileTarget::Preview(node_id) => {
                let port = graph
                    .preview_port(node_id)
                    .map_err(|_| CodegenError::NodeNotFound(node_id))?;
                (graph.dependency_closure_of(node_id), Some((node_id, port)))
            }
        };

        let nodes: Vec<&Node> = order.iter().filter_map(|id| graph.node(*id)).collect();

        let requested: BTreeSet<String> = nodes
            .iter()
            .filter_map(|node| registry.create(&node.module_type).ok())
            .flat_map(|module| module.required_includes())
            .collect();
        let resolved = resolver.resolve(requested.iter().map(String::as_str));

        let mut functions = String::new();
        let mut body = String::new();
        let mut declared: HashMap<String, DataType> = HashMap::new();
        let mut node_count = 0;

        for node in &nodes {
            let Ok(module) = registry.create(&node.module_type) else {
                tracing::warn!("Node {}: unknown module type '{}'", node.id, node.module_type);
                let _ = writeln!(
                    functions,
                    "// Node {}: unknown module type '{}'\n",
                    node.id, node.module_type
                );
                continue;
            };

            // Producers feeding this node, deduplicated, in connection order
            let mut producers: Vec<(String, DataType)> = Vec::new();
            let mut inputs = PortBindings::new();

            for port in module.input_ports() {
                let connected = graph
                    .input_connection(node.id, &port.name)
                    .map(|c| variable_name(c.from_node, &c.from_port))
                    .and_then(|var| declared.get(&var).map(|ty| (var, *ty)));

                let value = match connected {
                    Some((var, data_type)) => {
                        if !producers.iter().any(|(name, _)| *name == var) {
                            producers.push((var.clone(), data_type));
                        }
                        var
                    }
                    None => node
                        .parameter(&port.name)
                        .map(str::to_string)
                        .or_else(|| port.default_expression.clone())
                        .or_else(|| module.default_parameters().remove(&port.name))
                        .unwrap_or_else(|| {
                            tracing::debug!(
                                "Node {} input '{}' has no value, using placeholder",
                                node.id,
                                port.name
                            );
                            port.data_type.zero_literal().to_string()
                        }),
                };
                inputs.insert(port.name.clone(), value);
            }

            // Non-port parameters, overrides winning over defaults
            let mut parameters: BTreeMap<String, String> = module.default_parameters();
            parameters.extend(node.parameters.clone());
            for (name, value) in parameters {
                if module.input_port(&name).is_none() {
                    inputs.insert(name, value);
                }
            }

            let outputs: Vec<OutputVariable> = module
                .output_ports()
                .iter()
                .map(|port| OutputVariable {
                    name: node.variable_name(&port.name),
                    data_type: port.data_type,
                })
                .collect();
            let output_bindings: PortBindings = module
                .output_ports()
                .iter()
                .zip(&outputs)
                .map(|(port, var)| (port.name.clone(), var.name.clone()))
                .collect();

            let function = format!("node{}_func", node.id);
            let mut signature = vec![
                format!("vec2 {UV_VARIABLE}"),
                format!("float {TIME_VARIABLE}"),
            ];
            signature.extend(
                producers
                    .iter()
                    .map(|(name, ty)| format!("in {} {}", ty.glsl_name(), name)),
            );
            signature.extend(
                outputs
                    .iter()
                    .map(|var| format!("out {} {}", var.data_type.glsl_name(), var.name)),
            );

            let _ = writeln!(functions, "// Node {} ({})", node.id, module.name());
            let _ = writeln!(functions, "void {}({}) {{", function, signature.join(", "));
            functions.push_str(&module.generate_source(&inputs, &output_bindings));
            functions.push_str("}\n\n");

            let mut arguments = vec![UV_VARIABLE.to_string(), TIME_VARIABLE.to_string()];
            arguments.extend(producers.into_iter().map(|(name, _)| name));
            for var in &outputs {
                let _ = writeln!(body, "    {} {};", var.data_type.glsl_name(), var.name);
                arguments.push(var.name.clone());
            }
            let _ = writeln!(body, "    {}({});", function, arguments.join(", "));

            for var in outputs {
                declared.insert(var.name, var.data_type);
            }
            node_count += 1;
        }

        let sink_statement = match sink {
            Some((node_id, port)) => {
                let var = variable_name(node_id, &port);
                match declared.get(&var) {
                    Some(DataType::Scalar) => format!("    FragColor = vec4(vec3({var}), 1.0);\n"),
                    Some(DataType::Vec3) => format!("    FragColor = vec4({var}, 1.0);\n"),
                    Some(DataType::Vec4) => format!("    FragColor = {var};\n"),
                    Some(_) => UNSUPPORTED_OUTPUT.to_string(),
                    None => MISSING_OUTPUT.to_string(),
                }
            }
            None => MISSING_OUTPUT.to_string(),
        };

        let mut fragment = format!("#version {}\n\n", self.options.glsl_version);
        if !resolved.source.is_empty() {
            fragment.push_str(&resolved.source);
            fragment.push('\n');
        }
        fragment.push_str("in vec2 TexCoord;\nout vec4 FragColor;\n\n");
        fragment.push_str("uniform float iTime;\nuniform vec2 iResolution;\n\n");
        fragment.push_str(&functions);
        fragment.push_str("void main() {\n    vec2 uv = TexCoord;\n\n");
        fragment.push_str(&body);
        fragment.push('\n');
        fragment.push_str(&sink_statement);
        fragment.push_str("}\n");

        let mut includes = resolved.files;
        includes.extend(resolved.missing.iter().cloned());
        includes.sort();
        includes.dedup();
        let mut missing_includes = resolved.missing;
        missing_includes.sort();

        tracing::debug!(
            "Generated shader for '{}': {} nodes, {} includes",
            graph.name,
            node_count,
            includes.len()
        );

        Ok(GeneratedShader {
            vertex_source: self.vertex_source(),
            fragment_source: fragment,
            includes,
            missing_includes,
            node_count,
        })
    }
}
