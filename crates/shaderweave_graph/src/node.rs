// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph.

use crate::module::ShaderModule;
use crate::port::Port;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a node, unique within its graph and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Variable name holding the value of `port` on node `node_id`
pub fn variable_name(node_id: NodeId, port: &str) -> String {
    format!("node{}_{}", node_id.0, port)
}

/// A module instance in the graph
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Registered module type name
    pub module_type: String,
    /// Parameter overrides
    pub parameters: BTreeMap<String, String>,
    module: Box<dyn ShaderModule>,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        module_type: impl Into<String>,
        module: Box<dyn ShaderModule>,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            module_type: module_type.into(),
            parameters,
            module,
        }
    }

    /// The module instance this node was created with
    pub fn module(&self) -> &dyn ShaderModule {
        self.module.as_ref()
    }

    /// Get an input port by name
    pub fn input(&self, name: &str) -> Option<&Port> {
        self.module.input_port(name)
    }

    /// Get an output port by name
    pub fn output(&self, name: &str) -> Option<&Port> {
        self.module.output_port(name)
    }

    /// Declared input ports
    pub fn inputs(&self) -> &[Port] {
        self.module.input_ports()
    }

    /// Declared output ports
    pub fn outputs(&self) -> &[Port] {
        self.module.output_ports()
    }

    /// Get a parameter override
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Variable name for one of this node's outputs
    pub fn variable_name(&self, port: &str) -> String {
        variable_name(self.id, port)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("module_type", &self.module_type)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
