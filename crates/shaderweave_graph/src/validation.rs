// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph validation: structural errors block compilation, warnings do not.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::DataType;

/// A problem that makes the graph impossible to compile
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No output designated
    #[error("No output node specified")]
    NoOutput,

    /// The designated output node is gone
    #[error("Output node {0} does not exist")]
    OutputNodeMissing(NodeId),

    /// The connections form a cycle
    #[error("Circular dependency detected")]
    CircularDependency,
}

/// A problem the compiler works around
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationWarning {
    /// A required input has no connection, override or default
    #[error("Node {node} has unconnected required input: {port}")]
    UnconnectedRequiredInput {
        /// Node owning the input
        node: NodeId,
        /// Input port name
        port: String,
    },

    /// The designated output port is not declared on the output node
    #[error("Output node {node} has no output port named {port}")]
    OutputPortMissing {
        /// Output node
        node: NodeId,
        /// Designated port name
        port: String,
    },

    /// A connection joins ports whose types do not convert
    #[error("Connection {from_node}.{from_port} ({from_type}) -> {to_node}.{to_port} ({to_type}) has incompatible types")]
    IncompatiblePortTypes {
        /// Source node
        from_node: NodeId,
        /// Source port
        from_port: String,
        /// Source type
        from_type: DataType,
        /// Target node
        to_node: NodeId,
        /// Target port
        to_port: String,
        /// Target type
        to_type: DataType,
    },
}

/// Result of [`Graph::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Blocking problems
    pub errors: Vec<ValidationError>,
    /// Non-blocking problems
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// True when there are no errors
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when there is at least one warning
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl Graph {
    /// Check the graph for errors and warnings. Never mutates.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        match self.output() {
            None => report.errors.push(ValidationError::NoOutput),
            Some(output) => match self.node(output.node) {
                None => report
                    .errors
                    .push(ValidationError::OutputNodeMissing(output.node)),
                Some(node) if node.output(&output.port).is_none() => {
                    report.warnings.push(ValidationWarning::OutputPortMissing {
                        node: output.node,
                        port: output.port.clone(),
                    });
                }
                Some(_) => {}
            },
        }

        if self.topological_order().is_err() {
            report.errors.push(ValidationError::CircularDependency);
        }

        for node in self.nodes() {
            for port in node.inputs().iter().filter(|p| p.needs_value()) {
                let fed = self.input_connection(node.id, &port.name).is_some()
                    || node.parameter(&port.name).is_some();
                if !fed {
                    report.warnings.push(ValidationWarning::UnconnectedRequiredInput {
                        node: node.id,
                        port: port.name.clone(),
                    });
                }
            }
        }

        for connection in self.connections() {
            let from_type = self
                .node(connection.from_node)
                .and_then(|n| n.output(&connection.from_port))
                .map(|p| p.data_type);
            let to_type = self
                .node(connection.to_node)
                .and_then(|n| n.input(&connection.to_port))
                .map(|p| p.data_type);

            if let (Some(from_type), Some(to_type)) = (from_type, to_type) {
                if !from_type.can_connect_to(&to_type) {
                    report.warnings.push(ValidationWarning::IncompatiblePortTypes {
                        from_node: connection.from_node,
                        from_port: connection.from_port.clone(),
                        from_type,
                        to_node: connection.to_node,
                        to_port: connection.to_port.clone(),
                        to_type,
                    });
                }
            }
        }

        if !report.is_valid() {
            tracing::debug!("Graph '{}' failed validation: {:?}", self.name, report.errors);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModuleRegistry;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn graph() -> Graph {
        Graph::new("Test", Arc::new(ModuleRegistry::with_builtin_modules()))
    }

    #[test]
    fn test_empty_graph_has_no_output() {
        let report = graph().validate();
        assert_eq!(report.errors, vec![ValidationError::NoOutput]);
        assert_eq!(report.errors[0].to_string(), "No output node specified");
    }

    #[test]
    fn test_output_node_missing() {
        let mut graph = graph();
        graph.set_output(NodeId(7), "output");
        let report = graph.validate();
        assert_eq!(report.errors, vec![ValidationError::OutputNodeMissing(NodeId(7))]);
    }

    #[test]
    fn test_single_generator_is_clean() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        graph.set_output(noise, "output");

        let report = graph.validate();
        assert!(report.is_valid());
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_cycle_is_an_error() {
        let mut graph = graph();
        let a = graph.add_node("math", BTreeMap::new()).unwrap();
        let b = graph.add_node("math", BTreeMap::new()).unwrap();
        graph.add_connection(a, "output", b, "a").unwrap();
        graph.add_connection(b, "output", a, "a").unwrap();
        graph.set_output(b, "output");

        let report = graph.validate();
        assert_eq!(report.errors, vec![ValidationError::CircularDependency]);
    }

    #[test]
    fn test_unconnected_required_input_warns() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        let blend = graph.add_node("blend", BTreeMap::new()).unwrap();
        let color = graph.add_node("color", BTreeMap::new()).unwrap();
        graph.add_connection(noise, "output", color, "value").unwrap();
        graph.add_connection(color, "output", blend, "base").unwrap();
        graph.set_output(blend, "output");

        let report = graph.validate();
        assert!(report.is_valid());
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::UnconnectedRequiredInput {
                node: blend,
                port: "overlay".to_string(),
            }]
        );
        assert_eq!(
            report.warnings[0].to_string(),
            format!("Node {blend} has unconnected required input: overlay")
        );
    }

    #[test]
    fn test_override_satisfies_required_input() {
        let mut graph = graph();
        let color = graph
            .add_node("color", BTreeMap::from([("value".to_string(), "0.25".to_string())]))
            .unwrap();
        graph.set_output(color, "output");
        assert!(!graph.validate().has_warnings());
    }

    #[test]
    fn test_incompatible_connection_warns() {
        let mut graph = graph();
        let color = graph.add_node("color", BTreeMap::new()).unwrap();
        let math = graph.add_node("math", BTreeMap::new()).unwrap();
        graph.add_connection(color, "output", math, "a").unwrap();
        graph.add_connection(color, "output", math, "b").unwrap();
        graph.set_output(math, "output");

        let report = graph.validate();
        let incompatible = report
            .warnings
            .iter()
            .filter(|w| matches!(w, ValidationWarning::IncompatiblePortTypes { .. }))
            .count();
        assert_eq!(incompatible, 2);
    }

    #[test]
    fn test_missing_output_port_warns() {
        let mut graph = graph();
        let noise = graph.add_node("noise", BTreeMap::new()).unwrap();
        graph.set_output(noise, "color");

        let report = graph.validate();
        assert!(report.is_valid());
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::OutputPortMissing {
                node: noise,
                port: "color".to_string(),
            }]
        );
    }
}
