// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.

use crate::connection::{Connection, ConnectionId};
use crate::node::{Node, NodeId};
use crate::port::DataType;
use crate::registry::ModuleRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Port name used when an output is designated without naming one
pub const DEFAULT_OUTPUT_PORT: &str = "output";

/// The designated sink of a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    /// Node whose output is written to the sink
    pub node: NodeId,
    /// Output port on that node
    pub port: String,
}

/// A shader node graph
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    registry: Arc<ModuleRegistry>,
    nodes: IndexMap<NodeId, Node>,
    connections: IndexMap<ConnectionId, Connection>,
    output: Option<OutputTarget>,
    next_node_id: u32,
    next_connection_id: u32,
    strict_port_types: bool,
}

impl Graph {
    /// Create a new empty graph backed by a module registry
    pub fn new(name: impl Into<String>, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            output: None,
            next_node_id: 1,
            next_connection_id: 1,
            strict_port_types: false,
        }
    }

    /// The registry nodes are created from
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Reject type-incompatible connections in [`Graph::add_connection`]
    pub fn set_strict_port_types(&mut self, strict: bool) {
        self.strict_port_types = strict;
    }

    /// Whether connections are type-checked on insertion
    pub fn strict_port_types(&self) -> bool {
        self.strict_port_types
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Add a node of a registered module type. The graph is untouched on failure.
    pub fn add_node(
        &mut self,
        module_type: &str,
        parameters: BTreeMap<String, String>,
    ) -> Result<NodeId, GraphError> {
        let module = self.registry.create(module_type).map_err(|_| {
            tracing::warn!("Failed to create module: {}", module_type);
            GraphError::UnknownModule(module_type.to_string())
        })?;

        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.insert(id, Node::new(id, module_type, module, parameters));

        tracing::debug!("Added node {} ({})", id, module_type);
        Ok(id)
    }

    /// Add a node under a caller-chosen id. Later ids continue after the largest seen.
    pub(crate) fn insert_node_with_id(
        &mut self,
        id: NodeId,
        module_type: &str,
        parameters: BTreeMap<String, String>,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        let module = self
            .registry
            .create(module_type)
            .map_err(|_| GraphError::UnknownModule(module_type.to_string()))?;

        self.nodes.insert(id, Node::new(id, module_type, module, parameters));
        self.next_node_id = self.next_node_id.max(id.0.saturating_add(1));

        tracing::debug!("Restored node {} ({})", id, module_type);
        Ok(())
    }

    /// Remove a node and every connection touching it
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(&node_id)?;
        self.connections.retain(|_, c| !c.involves_node(node_id));

        if self.output.as_ref().is_some_and(|o| o.node == node_id) {
            self.output = None;
        }

        tracing::debug!("Removed node {} ({})", node_id, node.module_type);
        Some(node)
    }

    /// Replace a node's parameter overrides
    pub fn update_parameters(
        &mut self,
        node_id: NodeId,
        parameters: BTreeMap<String, String>,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.parameters = parameters;
        Ok(())
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Connect an output port to an input port.
    ///
    /// Any connection already feeding `(to_node, to_port)` is replaced.
    pub fn add_connection(
        &mut self,
        from_node: NodeId,
        from_port: &str,
        to_node: NodeId,
        to_port: &str,
    ) -> Result<ConnectionId, GraphError> {
        let source_type = self.output_type(from_node, from_port)?;
        let target_type = self.input_type(to_node, to_port)?;

        if self.strict_port_types && !source_type.can_connect_to(&target_type) {
            return Err(GraphError::IncompatiblePorts {
                from_type: source_type,
                to_type: target_type,
            });
        }

        self.remove_connection_to(to_node, to_port);

        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;
        self.connections
            .insert(id, Connection::new(id, from_node, from_port, to_node, to_port));

        tracing::debug!("Connected {}.{} -> {}.{}", from_node, from_port, to_node, to_port);
        Ok(id)
    }

    fn output_type(&self, node_id: NodeId, port: &str) -> Result<DataType, GraphError> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        node.output(port)
            .map(|p| p.data_type)
            .ok_or_else(|| GraphError::PortNotFound {
                node: node_id,
                port: port.to_string(),
            })
    }

    fn input_type(&self, node_id: NodeId, port: &str) -> Result<DataType, GraphError> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        node.input(port)
            .map(|p| p.data_type)
            .ok_or_else(|| GraphError::PortNotFound {
                node: node_id,
                port: port.to_string(),
            })
    }

    /// Remove exactly the given edge
    pub fn disconnect(
        &mut self,
        from_node: NodeId,
        from_port: &str,
        to_node: NodeId,
        to_port: &str,
    ) -> bool {
        let found = self
            .connections
            .values()
            .find(|c| c.matches(from_node, from_port, to_node, to_port))
            .map(|c| c.id);

        match found {
            Some(id) => {
                self.connections.shift_remove(&id);
                tracing::debug!("Disconnected {}.{} -> {}.{}", from_node, from_port, to_node, to_port);
                true
            }
            None => false,
        }
    }

    /// Remove whatever feeds an input
    pub fn remove_connection_to(&mut self, to_node: NodeId, to_port: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|_, c| !c.targets(to_node, to_port));
        self.connections.len() != before
    }

    /// Get all connections in insertion order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the connection feeding an input, if any
    pub fn input_connection(&self, to_node: NodeId, to_port: &str) -> Option<&Connection> {
        self.connections.values().find(|c| c.targets(to_node, to_port))
    }

    /// Get connections feeding a node
    pub fn connections_to_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.to_node == node_id)
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Designate the sink. Existence is checked by [`Graph::validate`], not here.
    pub fn set_output(&mut self, node_id: NodeId, port: impl Into<String>) {
        self.output = Some(OutputTarget {
            node: node_id,
            port: port.into(),
        });
    }

    /// Clear the designated sink
    pub fn clear_output(&mut self) {
        self.output = None;
    }

    /// The designated sink
    pub fn output(&self) -> Option<&OutputTarget> {
        self.output.as_ref()
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Nodes ordered so every connection points forward (Kahn's algorithm)
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut in_degree: HashMap<NodeId, usize> =
            self.nodes.keys().map(|id| (*id, 0)).collect();
        let mut downstream: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for connection in self.connections.values() {
            if !in_degree.contains_key(&connection.from_node) {
                continue;
            }
            let Some(degree) = in_degree.get_mut(&connection.to_node) else {
                continue;
            };
            *degree += 1;
            downstream
                .entry(connection.from_node)
                .or_default()
                .push(connection.to_node);
        }

        let mut queue: VecDeque<NodeId> = self
            .nodes
            .keys()
            .filter(|id| in_degree.get(id) == Some(&0))
            .copied()
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            order.push(current);
            for next in downstream.get(&current).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*next);
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            return Err(CycleError);
        }
        Ok(order)
    }

    /// The transitive inputs of a node followed by the node itself.
    ///
    /// Empty if the node does not exist.
    pub fn dependency_closure_of(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        if self.nodes.contains_key(&node_id) {
            self.visit_inputs(node_id, &mut visited, &mut order);
        }
        order
    }

    fn visit_inputs(&self, node_id: NodeId, visited: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
        if !visited.insert(node_id) {
            return;
        }

        for connection in self.connections_to_node(node_id) {
            if self.nodes.contains_key(&connection.from_node) {
                self.visit_inputs(connection.from_node, visited, order);
            }
        }

        order.push(node_id);
    }

    /// Build a fresh graph holding only what `node_id` depends on.
    ///
    /// Ids are reassigned; the new graph's output is the mapped `node_id`.
    pub fn extract_subgraph(&self, node_id: NodeId) -> Result<Graph, GraphError> {
        let output_port = self.preview_port(node_id)?;

        let mut subgraph = Graph::new(
            format!("{} (node {})", self.name, node_id),
            Arc::clone(&self.registry),
        );
        subgraph.strict_port_types = self.strict_port_types;

        let mut id_map = HashMap::new();
        for original in self.dependency_closure_of(node_id) {
            if let Some(node) = self.nodes.get(&original) {
                let mapped = subgraph.add_node(&node.module_type, node.parameters.clone())?;
                id_map.insert(original, mapped);
            }
        }

        for connection in self.connections.values() {
            if let (Some(from), Some(to)) =
                (id_map.get(&connection.from_node), id_map.get(&connection.to_node))
            {
                subgraph.add_connection(*from, &connection.from_port, *to, &connection.to_port)?;
            }
        }

        if let Some(mapped) = id_map.get(&node_id) {
            subgraph.set_output(*mapped, output_port);
        }

        Ok(subgraph)
    }

    /// Port shown when previewing a node: the designated output port if the
    /// node is the graph output, else its first declared output.
    pub fn preview_port(&self, node_id: NodeId) -> Result<String, GraphError> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let port = match &self.output {
            Some(output) if output.node == node_id => output.port.clone(),
            _ => node
                .outputs()
                .first()
                .map_or_else(|| DEFAULT_OUTPUT_PORT.to_string(), |p| p.name.clone()),
        };
        Ok(port)
    }

    // ========================================================================
    // Misc
    // ========================================================================

    /// Union of the include paths every node requires
    pub fn required_includes(&self) -> BTreeSet<String> {
        self.nodes
            .values()
            .flat_map(|node| node.module().required_includes())
            .collect()
    }

    /// Remove every node and connection. Id counters keep counting.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
        self.output = None;
    }
}

/// Error when editing a graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not declared on the node
    #[error("Port not found: {node}.{port}")]
    PortNotFound {
        /// Node that was searched
        node: NodeId,
        /// Port name that was not declared
        port: String,
    },

    /// Module type not registered
    #[error("Unknown module type: {0}")]
    UnknownModule(String),

    /// A node with this id already exists
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// Incompatible port types (strict mode only)
    #[error("Incompatible port types: {from_type} cannot feed {to_type}")]
    IncompatiblePorts {
        /// Type of the source output
        from_type: DataType,
        /// Type of the target input
        to_type: DataType,
    },
}

/// Error when graph contains a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> Arc<ModuleRegistry> {
        Arc::new(ModuleRegistry::with_builtin_modules())
    }

    fn graph() -> Graph {
        Graph::new("Test", registry())
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn position(order: &[NodeId], id: NodeId) -> usize {
        order.iter().position(|n| *n == id).unwrap()
    }

    #[test]
    fn test_add_node_assigns_monotonic_ids() {
        let mut graph = graph();
        let a = graph.add_node("noise", BTreeMap::new()).unwrap();
        let b = graph.add_node("gradient", BTreeMap::new()).unwrap();
        assert_eq!(a, NodeId(1));
        assert_eq!(b, NodeId(2));

        graph.remove_node(b);
        let c = graph.add_node("random", BTreeMap::new()).unwrap();
        assert_eq!(c, NodeId(3));
    }

    #[test]
    fn test_add_unknown_node_fails_without_mutation() {
        let mut graph = graph();
        let err = graph.add_node("teapot", BTreeMap::new()).unwrap_err();
        assert_eq!(err, GraphError::UnknownModule("teapot".to_string()));
        assert_eq!(graph.node_count(), 0);

        // The failed attempt must not burn an id
        assert_eq!(graph.add_node("noise", BTreeMap::new()).unwrap(), NodeId(1));
    }

    #[test]
    fn test_connection_validation() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let color = graph.add_node("color", BTreeMap::new()).unwrap();

        assert_eq!(
            graph.add_connection(noise, "output", NodeId(99), "value"),
            Err(GraphError::NodeNotFound(NodeId(99)))
        );
        assert!(matches!(
            graph.add_connection(noise, "nope", color, "value"),
            Err(GraphError::PortNotFound { .. })
        ));
        // Inputs are not valid sources
        assert!(matches!(
            graph.add_connection(noise, "uv", color, "value"),
            Err(GraphError::PortNotFound { .. })
        ));
        assert!(graph.add_connection(noise, "output", color, "value").is_ok());
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_input_replacement() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let fbm = graph.add_node("fbm", BTreeMap::new()).unwrap();
        let color = graph.add_node("color", BTreeMap::new()).unwrap();

        graph.add_connection(noise, "output", color, "value").unwrap();
        graph.add_connection(fbm, "output", color, "value").unwrap();

        assert_eq!(graph.connection_count(), 1);
        let feeding = graph.input_connection(color, "value").unwrap();
        assert_eq!(feeding.from_node, fbm);
    }

    #[test]
    fn test_disconnect_exact_edge() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let math = graph.add_node("math", BTreeMap::new()).unwrap();
        graph.add_connection(noise, "output", math, "a").unwrap();
        graph.add_connection(noise, "output", math, "b").unwrap();

        assert!(!graph.disconnect(noise, "output", math, "value"));
        assert!(graph.disconnect(noise, "output", math, "a"));
        assert!(!graph.disconnect(noise, "output", math, "a"));
        assert_eq!(graph.connection_count(), 1);
        assert!(graph.input_connection(math, "b").is_some());
    }

    #[test]
    fn test_removal_cascade() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let color = graph.add_node("color", BTreeMap::new()).unwrap();
        let filter = graph.add_node("filter", BTreeMap::new()).unwrap();
        graph.add_connection(noise, "output", color, "value").unwrap();
        graph.add_connection(color, "output", filter, "input").unwrap();
        graph.set_output(color, "output");

        assert!(graph.remove_node(color).is_some());
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.connections().all(|c| !c.involves_node(color)));
        assert!(graph.output().is_none());
        assert!(graph.remove_node(color).is_none());
    }

    #[test]
    fn test_remove_other_node_keeps_output() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let gradient = graph.add_node("gradient", BTreeMap::new()).unwrap();
        graph.set_output(noise, "output");
        graph.remove_node(gradient);
        assert_eq!(graph.output().map(|o| o.node), Some(noise));
    }

    #[test]
    fn test_strict_port_types() {
        let mut graph = graph();
        let transform = graph.add_node("transform", BTreeMap::new()).unwrap();
        let math = graph.add_node("math", BTreeMap::new()).unwrap();

        // Permissive by default: vec2 into a scalar input is accepted
        assert!(graph.add_connection(transform, "output", math, "a").is_ok());

        graph.set_strict_port_types(true);
        assert_eq!(
            graph.add_connection(transform, "output", math, "b"),
            Err(GraphError::IncompatiblePorts {
                from_type: DataType::Vec2,
                to_type: DataType::Scalar,
            })
        );
    }

    #[test]
    fn test_topological_order_chain() {
        let mut graph = graph();
        let color = graph.add_node("color", BTreeMap::new()).unwrap();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let transform = graph.add_node("transform", BTreeMap::new()).unwrap();
        graph.add_connection(transform, "output", noise, "uv").unwrap();
        graph.add_connection(noise, "output", color, "value").unwrap();

        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec![transform, noise, color]);
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = graph();
        let a = graph.add_node("math", BTreeMap::new()).unwrap();
        let b = graph.add_node("math", BTreeMap::new()).unwrap();
        graph.add_connection(a, "output", b, "a").unwrap();
        graph.add_connection(b, "output", a, "a").unwrap();

        assert_eq!(graph.topological_order(), Err(CycleError));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut graph = graph();
        let a = graph.add_node("math", BTreeMap::new()).unwrap();
        graph.add_connection(a, "output", a, "b").unwrap();
        assert!(graph.topological_order().is_err());
    }

    #[test]
    fn test_dependency_closure() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let transform = graph.add_node("transform", BTreeMap::new()).unwrap();
        let unrelated = graph.add_node("gradient", BTreeMap::new()).unwrap();
        graph.add_connection(noise, "output", transform, "rotation").unwrap();
        graph.set_output(transform, "output");

        assert_eq!(graph.dependency_closure_of(transform), vec![noise, transform]);
        assert_eq!(graph.dependency_closure_of(unrelated), vec![unrelated]);
        assert!(graph.dependency_closure_of(NodeId(42)).is_empty());
    }

    #[test]
    fn test_dependency_closure_shared_ancestor_once() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let math = graph.add_node("math", BTreeMap::new()).unwrap();
        graph.add_connection(noise, "output", math, "a").unwrap();
        graph.add_connection(noise, "output", math, "b").unwrap();

        assert_eq!(graph.dependency_closure_of(math), vec![noise, math]);
    }

    #[test]
    fn test_dependency_closure_terminates_on_cycle() {
        let mut graph = graph();
        let a = graph.add_node("math", BTreeMap::new()).unwrap();
        let b = graph.add_node("math", BTreeMap::new()).unwrap();
        graph.add_connection(a, "output", b, "a").unwrap();
        graph.add_connection(b, "output", a, "a").unwrap();

        let closure = graph.dependency_closure_of(a);
        assert_eq!(closure.len(), 2);
        assert_eq!(closure.last(), Some(&a));
    }

    #[test]
    fn test_extract_subgraph() {
        let mut graph = graph();
        let unrelated = graph.add_node("gradient", BTreeMap::new()).unwrap();
        let noise = graph.add_node("noise", params(&[("scale", "8.0")])).unwrap();
        let color = graph.add_node("color", BTreeMap::new()).unwrap();
        let filter = graph.add_node("filter", BTreeMap::new()).unwrap();
        graph.add_connection(noise, "output", color, "value").unwrap();
        graph.add_connection(unrelated, "output", filter, "strength").unwrap();
        graph.add_connection(color, "output", filter, "input").unwrap();

        let subgraph = graph.extract_subgraph(color).unwrap();
        assert_eq!(subgraph.node_count(), 2);
        assert_eq!(subgraph.connection_count(), 1);

        let ids: Vec<_> = subgraph.node_ids().collect();
        assert_eq!(ids, vec![NodeId(1), NodeId(2)]);
        assert_eq!(subgraph.node(NodeId(1)).unwrap().module_type, "noise");
        assert_eq!(subgraph.node(NodeId(1)).unwrap().parameter("scale"), Some("8.0"));

        let output = subgraph.output().unwrap();
        assert_eq!(output.node, NodeId(2));
        assert_eq!(output.port, "output");
        assert!(subgraph.validate().is_valid());
    }

    #[test]
    fn test_extract_subgraph_uses_designated_port() {
        let mut graph = graph();
        let voronoi = graph.add_node("voronoi", BTreeMap::new()).unwrap();
        graph.set_output(voronoi, "cellId");
        let subgraph = graph.extract_subgraph(voronoi).unwrap();
        assert_eq!(subgraph.output().unwrap().port, "cellId");

        let mut other = self::graph();
        let voronoi = other.add_node("voronoi", BTreeMap::new()).unwrap();
        let subgraph = other.extract_subgraph(voronoi).unwrap();
        assert_eq!(subgraph.output().unwrap().port, "distance");

        assert_eq!(
            other.extract_subgraph(NodeId(9)).unwrap_err(),
            GraphError::NodeNotFound(NodeId(9))
        );
    }

    #[test]
    fn test_update_parameters() {
        let mut graph = graph();
        let noise = graph.add_node("noise", params(&[("scale", "2.0")])).unwrap();
        graph.update_parameters(noise, params(&[("time", "0.0")])).unwrap();

        let node = graph.node(noise).unwrap();
        assert_eq!(node.parameter("scale"), None);
        assert_eq!(node.parameter("time"), Some("0.0"));
        assert_eq!(
            graph.update_parameters(NodeId(5), BTreeMap::new()),
            Err(GraphError::NodeNotFound(NodeId(5)))
        );
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut graph = graph();
        graph.add_node("noise", BTreeMap::new()).unwrap();
        graph.add_node("noise", BTreeMap::new()).unwrap();
        graph.set_output(NodeId(1), "output");
        graph.clear();

        assert_eq!(graph.node_count(), 0);
        assert!(graph.output().is_none());
        assert_eq!(graph.add_node("noise", BTreeMap::new()).unwrap(), NodeId(3));
    }

    #[test]
    fn test_required_includes_union() {
        let mut graph = graph();
        graph.add_node("noise", BTreeMap::new()).unwrap();
        graph.add_node("noise", BTreeMap::new()).unwrap();
        graph.add_node("transform", BTreeMap::new()).unwrap();
        graph.add_node("gradient", BTreeMap::new()).unwrap();

        let includes: Vec<_> = graph.required_includes().into_iter().collect();
        assert_eq!(includes, vec!["generative/snoise.glsl", "math/rotate2d.glsl"]);
    }

    proptest! {
        #[test]
        fn prop_topological_order_respects_edges(
            node_count in 1usize..12,
            edges in proptest::collection::vec((0usize..12, 0usize..12, any::<bool>()), 0..30),
        ) {
            let mut graph = graph();
            let ids: Vec<_> = (0..node_count)
                .map(|_| graph.add_node("math", BTreeMap::new()).unwrap())
                .collect();

            // Only forward edges, so the graph stays acyclic
            for (a, b, use_a) in edges {
                let (a, b) = (a % node_count, b % node_count);
                if a < b {
                    let port = if use_a { "a" } else { "b" };
                    graph.add_connection(ids[a], "output", ids[b], port).unwrap();
                }
            }

            let order = graph.topological_order().unwrap();
            prop_assert_eq!(order.len(), node_count);
            for connection in graph.connections() {
                prop_assert!(position(&order, connection.from_node) < position(&order, connection.to_node));
            }
        }

        #[test]
        fn prop_closure_ends_with_target_and_is_ordered(
            node_count in 1usize..10,
            edges in proptest::collection::vec((0usize..10, 0usize..10), 0..20),
            target in 0usize..10,
        ) {
            let mut graph = graph();
            let ids: Vec<_> = (0..node_count)
                .map(|_| graph.add_node("math", BTreeMap::new()).unwrap())
                .collect();
            for (a, b) in edges {
                let (a, b) = (a % node_count, b % node_count);
                if a < b {
                    graph.add_connection(ids[a], "output", ids[b], "a").unwrap();
                }
            }

            let target = ids[target % node_count];
            let closure = graph.dependency_closure_of(target);
            prop_assert_eq!(closure.last(), Some(&target));
            for connection in graph.connections() {
                if let (Some(from), Some(to)) = (
                    closure.iter().position(|n| *n == connection.from_node),
                    closure.iter().position(|n| *n == connection.to_node),
                ) {
                    prop_assert!(from < to);
                }
            }
        }
    }
}
