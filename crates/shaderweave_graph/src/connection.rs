// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u32);

/// A connection from one node's output port to another node's input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source node ID
    pub from_node: NodeId,
    /// Source output port name
    pub from_port: String,
    /// Target node ID
    pub to_node: NodeId,
    /// Target input port name
    pub to_port: String,
}

impl Connection {
    /// Create a new connection
    pub fn new(
        id: ConnectionId,
        from_node: NodeId,
        from_port: impl Into<String>,
        to_node: NodeId,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            id,
            from_node,
            from_port: from_port.into(),
            to_node,
            to_port: to_port.into(),
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// Check if this connection feeds a specific input
    pub fn targets(&self, node_id: NodeId, port: &str) -> bool {
        self.to_node == node_id && self.to_port == port
    }

    /// Check if this is exactly the given edge
    pub fn matches(&self, from_node: NodeId, from_port: &str, to_node: NodeId, to_port: &str) -> bool {
        self.from_node == from_node
            && self.from_port == from_port
            && self.targets(to_node, to_port)
    }
}
