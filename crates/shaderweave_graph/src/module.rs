// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module type contract and the data-driven module definition.
//!
//! A module is a reusable unit of shading logic. It declares typed ports,
//! the library includes its fragment depends on, default parameter values,
//! and produces a source fragment from the variable names the code generator
//! binds to its ports.

use crate::port::{Port, PortDirection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Map from port (or parameter) name to a source-level expression
pub type PortBindings = BTreeMap<String, String>;

/// Module category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleCategory {
    /// Produces a value from the implicit coordinate/time context
    Generator,
    /// Combines or transforms existing values
    Operator,
}

impl ModuleCategory {
    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Generator => "Generator",
            Self::Operator => "Operator",
        }
    }

    /// All categories
    pub fn all() -> &'static [ModuleCategory] {
        &[Self::Generator, Self::Operator]
    }
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The contract every module type implements.
///
/// `generate_source` must use the names in `inputs` and `outputs` verbatim:
/// output names are variables to assign (they are declared by the caller),
/// input names are expressions to read.
pub trait ShaderModule: Send + Sync {
    /// Registered type name
    fn name(&self) -> &str;

    /// Category the module is listed under
    fn category(&self) -> ModuleCategory;

    /// Short human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Declared input ports
    fn input_ports(&self) -> &[Port];

    /// Declared output ports
    fn output_ports(&self) -> &[Port];

    /// Produce the source fragment for the given bindings
    fn generate_source(&self, inputs: &PortBindings, outputs: &PortBindings) -> String;

    /// Library include paths the fragment depends on
    fn required_includes(&self) -> BTreeSet<String>;

    /// Parameter name to default literal
    fn default_parameters(&self) -> BTreeMap<String, String>;

    /// Look up an input port by name
    fn input_port(&self, name: &str) -> Option<&Port> {
        self.input_ports().iter().find(|p| p.name == name)
    }

    /// Look up an output port by name
    fn output_port(&self, name: &str) -> Option<&Port> {
        self.output_ports().iter().find(|p| p.name == name)
    }
}

/// A module described entirely by data and a source template.
///
/// The template refers to bindings as `{name}`. Tokens that match neither an
/// input nor an output binding are left untouched, so GLSL blocks survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Unique type name
    pub name: String,
    /// Category
    pub category: ModuleCategory,
    /// Description
    pub description: String,
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Required include paths
    pub includes: Vec<String>,
    /// Default parameter values
    pub parameters: BTreeMap<String, String>,
    /// Source template
    pub template: String,
}

impl ModuleDefinition {
    /// Create an empty definition
    pub fn new(name: impl Into<String>, category: ModuleCategory) -> Self {
        Self {
            name: name.into(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            includes: Vec::new(),
            parameters: BTreeMap::new(),
            template: String::new(),
        }
    }

    /// Set the description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a port; direction decides which list it lands in
    pub fn port(mut self, port: Port) -> Self {
        match port.direction {
            PortDirection::Input => self.inputs.push(port),
            PortDirection::Output => self.outputs.push(port),
        }
        self
    }

    /// Add a required include
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.includes.push(path.into());
        self
    }

    /// Add a default parameter
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Set the source template
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }
}

impl ShaderModule for ModuleDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ModuleCategory {
        self.category
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_ports(&self) -> &[Port] {
        &self.inputs
    }

    fn output_ports(&self) -> &[Port] {
        &self.outputs
    }

    fn generate_source(&self, inputs: &PortBindings, outputs: &PortBindings) -> String {
        render_template(&self.template, |token| {
            outputs.get(token).or_else(|| inputs.get(token)).map(String::as_str)
        })
    }

    fn required_includes(&self) -> BTreeSet<String> {
        self.includes.iter().cloned().collect()
    }

    fn default_parameters(&self) -> BTreeMap<String, String> {
        self.parameters.clone()
    }
}

/// Substitute `{token}` occurrences using `lookup`.
pub fn render_template<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let token_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let token = &after[..token_len];

        match (after[token_len..].starts_with('}'), lookup(token)) {
            (true, Some(value)) if !token.is_empty() => {
                out.push_str(value);
                rest = &after[token_len + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::DataType;

    fn scale_module() -> ModuleDefinition {
        ModuleDefinition::new("scale", ModuleCategory::Operator)
            .describe("Multiply a value")
            .port(Port::input("value", DataType::Scalar).required())
            .port(Port::input("factor", DataType::Scalar).with_default("2.0"))
            .port(Port::output("output", DataType::Scalar))
            .include("math/const.glsl")
            .parameter("factor", "2.0")
            .template("    {output} = {value} * {factor};\n")
    }

    #[test]
    fn test_definition_ports() {
        let module = scale_module();
        assert_eq!(module.input_ports().len(), 2);
        assert_eq!(module.output_ports().len(), 1);
        assert!(module.input_port("factor").is_some());
        assert!(module.output_port("factor").is_none());
        assert_eq!(module.category(), ModuleCategory::Operator);
        assert!(module.required_includes().contains("math/const.glsl"));
        assert_eq!(module.default_parameters().get("factor").map(String::as_str), Some("2.0"));
    }

    #[test]
    fn test_generate_uses_bindings_verbatim() {
        let module = scale_module();
        let inputs = PortBindings::from([
            ("value".to_string(), "node1_output".to_string()),
            ("factor".to_string(), "0.5".to_string()),
        ]);
        let outputs = PortBindings::from([("output".to_string(), "node2_output".to_string())]);

        let source = module.generate_source(&inputs, &outputs);
        assert_eq!(source, "    node2_output = node1_output * 0.5;\n");
    }

    #[test]
    fn test_template_leaves_unknown_braces() {
        let rendered = render_template("if (x) { {a} = 1.0; } {missing} {", |token| {
            (token == "a").then_some("node1_a")
        });
        assert_eq!(rendered, "if (x) { node1_a = 1.0; } {missing} {");
    }
}
