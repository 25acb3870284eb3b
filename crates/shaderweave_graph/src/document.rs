// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serializable graph documents.
//!
//! A [`GraphDocument`] is the on-disk form of a [`Graph`]: plain records
//! without module instances. Documents are stored as RON and can be exported
//! as JSON.

use crate::graph::{Graph, GraphError, OutputTarget};
use crate::node::NodeId;
use crate::registry::ModuleRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Current document format version
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

fn current_version() -> u32 {
    DOCUMENT_FORMAT_VERSION
}

/// A node as stored in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Id within the document
    pub id: NodeId,
    /// Registered module type
    pub module_type: String,
    /// Parameter overrides
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// A connection as stored in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Source node
    pub from_node: NodeId,
    /// Source output port
    pub from_port: String,
    /// Target node
    pub to_node: NodeId,
    /// Target input port
    pub to_port: String,
}

/// On-disk form of a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Format version
    #[serde(default = "current_version")]
    pub version: u32,
    /// Graph name
    pub name: String,
    /// Nodes in insertion order
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Connections in insertion order
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    /// Designated output
    #[serde(default)]
    pub output: Option<OutputTarget>,
}

/// Error when loading or saving a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The text is not a valid document
    #[error("Failed to parse graph document: {0}")]
    Parse(String),

    /// The document could not be written
    #[error("Failed to serialize graph document: {0}")]
    Serialize(String),

    /// Written by a newer version
    #[error("Document version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest version understood
        supported: u32,
    },

    /// A node's module type is not registered
    #[error("Node {id} has unknown module type '{module_type}'")]
    UnknownModule {
        /// Node id in the document
        id: NodeId,
        /// Module type
        module_type: String,
    },

    /// Two node records share an id
    #[error("Duplicate node id {0} in document")]
    DuplicateNode(NodeId),

    /// A connection could not be re-created
    #[error("Invalid connection {from_node}.{from_port} -> {to_node}.{to_port}: {source}")]
    Connection {
        /// Source node in the document
        from_node: NodeId,
        /// Source port
        from_port: String,
        /// Target node in the document
        to_node: NodeId,
        /// Target port
        to_port: String,
        /// Underlying error
        #[source]
        source: GraphError,
    },
}

impl GraphDocument {
    /// Parse a RON document
    pub fn from_ron_str(text: &str) -> Result<Self, DocumentError> {
        let document: GraphDocument =
            ron::from_str(text).map_err(|e| DocumentError::Parse(e.to_string()))?;

        if document.version > DOCUMENT_FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: document.version,
                supported: DOCUMENT_FORMAT_VERSION,
            });
        }

        Ok(document)
    }

    /// Render as pretty RON
    pub fn to_ron_string(&self) -> Result<String, DocumentError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        ron::ser::to_string_pretty(self, config).map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// Render as pretty JSON
    pub fn to_json_string(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// Load a RON document from disk
    pub fn load_ron(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Save as RON
    pub fn save_ron(&self, path: &Path) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }
}

impl Graph {
    /// Capture the graph as a document
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            version: DOCUMENT_FORMAT_VERSION,
            name: self.name.clone(),
            nodes: self
                .nodes()
                .map(|node| NodeRecord {
                    id: node.id,
                    module_type: node.module_type.clone(),
                    parameters: node.parameters.clone(),
                })
                .collect(),
            connections: self
                .connections()
                .map(|c| ConnectionRecord {
                    from_node: c.from_node,
                    from_port: c.from_port.clone(),
                    to_node: c.to_node,
                    to_port: c.to_port.clone(),
                })
                .collect(),
            output: self.output().cloned(),
        }
    }

    /// Rebuild a graph from a document.
    ///
    /// Nodes keep their document ids, so ids named elsewhere (a preview node,
    /// the output) stay valid. New nodes continue after the largest id.
    pub fn from_document(
        document: &GraphDocument,
        registry: Arc<ModuleRegistry>,
    ) -> Result<Graph, DocumentError> {
        Self::from_document_with(document, registry, false)
    }

    /// Rebuild a graph from a document, optionally type-checking connections
    pub fn from_document_with(
        document: &GraphDocument,
        registry: Arc<ModuleRegistry>,
        strict_port_types: bool,
    ) -> Result<Graph, DocumentError> {
        let mut graph = Graph::new(document.name.clone(), registry);
        graph.set_strict_port_types(strict_port_types);

        for record in &document.nodes {
            graph
                .insert_node_with_id(record.id, &record.module_type, record.parameters.clone())
                .map_err(|e| match e {
                    GraphError::DuplicateNode(id) => DocumentError::DuplicateNode(id),
                    _ => DocumentError::UnknownModule {
                        id: record.id,
                        module_type: record.module_type.clone(),
                    },
                })?;
        }

        for record in &document.connections {
            graph
                .add_connection(record.from_node, &record.from_port, record.to_node, &record.to_port)
                .map_err(|source| DocumentError::Connection {
                    from_node: record.from_node,
                    from_port: record.from_port.clone(),
                    to_node: record.to_node,
                    to_port: record.to_port.clone(),
                    source,
                })?;
        }

        // A dangling output is reported by validation
        if let Some(output) = &document.output {
            graph.set_output(output.node, output.port.clone());
        }

        tracing::debug!(
            "Loaded graph '{}' ({} nodes, {} connections)",
            graph.name,
            graph.node_count(),
            graph.connection_count()
        );
        Ok(graph)
    }
}
