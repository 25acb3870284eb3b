// SPDX-License-Identifier: MIT OR Apache-2.0
//! Operator modules: combine or transform existing values.

use crate::module::{ModuleCategory, ModuleDefinition, PortBindings, ShaderModule};
use crate::port::{DataType, Port};
use crate::registry::ModuleRegistry;
use std::collections::{BTreeMap, BTreeSet};

/// Look up a binding, falling back to a literal
fn binding<'a>(bindings: &'a PortBindings, name: &str, fallback: &'a str) -> &'a str {
    bindings.get(name).map_or(fallback, String::as_str)
}

// ============================================================================
// Template operators
// ============================================================================

/// Normal blend of two colors
pub fn blend() -> ModuleDefinition {
    ModuleDefinition::new("blend", ModuleCategory::Operator)
        .describe("Blend an overlay color onto a base color")
        .port(Port::input("base", DataType::Vec3).required())
        .port(Port::input("overlay", DataType::Vec3).required())
        .port(Port::input("opacity", DataType::Scalar).with_default("1.0"))
        .port(Port::output("output", DataType::Vec3))
        .include("color/blend.glsl")
        .parameter("opacity", "1.0")
        .template("    {output} = blendNormal({base}, {overlay}, {opacity});\n")
}

/// Rotate, scale and offset coordinates around the center
pub fn transform() -> ModuleDefinition {
    ModuleDefinition::new("transform", ModuleCategory::Operator)
        .describe("Rotate, scale and offset UV coordinates")
        .port(Port::input("uv", DataType::Vec2).required().with_default(super::UV_VARIABLE))
        .port(Port::input("rotation", DataType::Scalar).with_default("0.0"))
        .port(Port::input("scale", DataType::Vec2).with_default("vec2(1.0)"))
        .port(Port::input("offset", DataType::Vec2).with_default("vec2(0.0)"))
        .port(Port::output("output", DataType::Vec2))
        .include("math/rotate2d.glsl")
        .parameter("rotation", "0.0")
        .parameter("scale", "vec2(1.0)")
        .parameter("offset", "vec2(0.0)")
        .template(concat!(
            "    vec2 centeredUV = {uv} - 0.5;\n",
            "    centeredUV = rotate2d({rotation}) * centeredUV;\n",
            "    centeredUV *= {scale};\n",
            "    {output} = centeredUV + 0.5 + {offset};\n",
        ))
}

/// Map a scalar onto a two-color ramp
pub fn color() -> ModuleDefinition {
    ModuleDefinition::new("color", ModuleCategory::Operator)
        .describe("Map a value between two colors")
        .port(Port::input("value", DataType::Scalar).required())
        .port(Port::input("colorA", DataType::Vec3).with_default("vec3(0.0)"))
        .port(Port::input("colorB", DataType::Vec3).with_default("vec3(1.0)"))
        .port(Port::output("output", DataType::Vec3))
        .parameter("colorA", "vec3(0.0, 0.0, 0.0)")
        .parameter("colorB", "vec3(1.0, 1.0, 1.0)")
        .template("    {output} = mix({colorA}, {colorB}, {value});\n")
}

// ============================================================================
// Math
// ============================================================================

/// Binary arithmetic on two scalars, selected by the `operation` parameter
pub struct MathModule {
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl MathModule {
    /// Operations understood by the `operation` parameter
    pub const OPERATIONS: &'static [&'static str] =
        &["add", "subtract", "multiply", "divide", "power", "min", "max"];

    /// Create the module
    pub fn new() -> Self {
        Self {
            inputs: vec![
                Port::input("a", DataType::Scalar).required(),
                Port::input("b", DataType::Scalar).required(),
            ],
            outputs: vec![Port::output("output", DataType::Scalar)],
        }
    }

    fn expression(operation: &str, a: &str, b: &str) -> Option<String> {
        let expr = match operation {
            "add" => format!("{a} + {b}"),
            "subtract" => format!("{a} - {b}"),
            "multiply" => format!("{a} * {b}"),
            "divide" => format!("{a} / {b}"),
            "power" => format!("pow({a}, {b})"),
            "min" => format!("min({a}, {b})"),
            "max" => format!("max({a}, {b})"),
            _ => return None,
        };
        Some(expr)
    }
}

impl Default for MathModule {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderModule for MathModule {
    fn name(&self) -> &str {
        "math"
    }

    fn category(&self) -> ModuleCategory {
        ModuleCategory::Operator
    }

    fn description(&self) -> &str {
        "Arithmetic on two values"
    }

    fn input_ports(&self) -> &[Port] {
        &self.inputs
    }

    fn output_ports(&self) -> &[Port] {
        &self.outputs
    }

    fn generate_source(&self, inputs: &PortBindings, outputs: &PortBindings) -> String {
        let a = binding(inputs, "a", "0.0");
        let b = binding(inputs, "b", "0.0");
        let output = binding(outputs, "output", "mathOutput");
        let operation = binding(inputs, "operation", "add");

        match Self::expression(operation, a, b) {
            Some(expr) => format!("    {output} = {expr};\n"),
            None => format!(
                "    // Unknown math operation '{operation}', using add\n    {output} = {a} + {b};\n"
            ),
        }
    }

    fn required_includes(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn default_parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("operation".to_string(), "add".to_string())])
    }
}

// ============================================================================
// Filter
// ============================================================================

/// Color filter selected by `filterType`, mixed in by `strength`
pub struct FilterModule {
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl FilterModule {
    /// Filters understood by the `filterType` parameter
    pub const FILTERS: &'static [&'static str] = &["identity", "invert", "grayscale", "threshold"];

    /// Create the module
    pub fn new() -> Self {
        Self {
            inputs: vec![
                Port::input("input", DataType::Vec3).required(),
                Port::input("strength", DataType::Scalar).with_default("1.0"),
            ],
            outputs: vec![Port::output("output", DataType::Vec3)],
        }
    }
}

impl Default for FilterModule {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderModule for FilterModule {
    fn name(&self) -> &str {
        "filter"
    }

    fn category(&self) -> ModuleCategory {
        ModuleCategory::Operator
    }

    fn description(&self) -> &str {
        "Color filter"
    }

    fn input_ports(&self) -> &[Port] {
        &self.inputs
    }

    fn output_ports(&self) -> &[Port] {
        &self.outputs
    }

    fn generate_source(&self, inputs: &PortBindings, outputs: &PortBindings) -> String {
        let input = binding(inputs, "input", "vec3(0.0)");
        let strength = binding(inputs, "strength", "1.0");
        let output = binding(outputs, "output", "filterOutput");
        let filter_type = binding(inputs, "filterType", "identity");

        let filtered = match filter_type {
            "invert" => format!("vec3(1.0) - {input}"),
            "grayscale" => format!("vec3(dot({input}, vec3(0.299, 0.587, 0.114)))"),
            "threshold" => format!("step(vec3(0.5), {input})"),
            "identity" => return format!("    {output} = {input};\n"),
            other => {
                return format!(
                    "    // Unknown filter '{other}', passing input through\n    {output} = {input};\n"
                )
            }
        };

        format!("    {output} = mix({input}, {filtered}, {strength});\n")
    }

    fn required_includes(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn default_parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("strength".to_string(), "1.0".to_string()),
            ("filterType".to_string(), "identity".to_string()),
        ])
    }
}

/// Register all operators
pub fn register_operators(registry: &mut ModuleRegistry) {
    for definition in [blend(), transform(), color()] {
        registry.register_definition(definition);
    }
    registry.register("math", || Box::new(MathModule::new()));
    registry.register("filter", || Box::new(FilterModule::new()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> PortBindings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_math_operations() {
        let module = MathModule::new();
        let outputs = bindings(&[("output", "node3_output")]);

        for (operation, expected) in [
            ("add", "node3_output = x + y;"),
            ("multiply", "node3_output = x * y;"),
            ("power", "node3_output = pow(x, y);"),
            ("max", "node3_output = max(x, y);"),
        ] {
            let inputs = bindings(&[("a", "x"), ("b", "y"), ("operation", operation)]);
            let source = module.generate_source(&inputs, &outputs);
            assert!(source.contains(expected), "{operation}: {source}");
        }
    }

    #[test]
    fn test_math_unknown_operation_falls_back() {
        let module = MathModule::new();
        let inputs = bindings(&[("a", "x"), ("b", "y"), ("operation", "modulo")]);
        let source = module.generate_source(&inputs, &bindings(&[("output", "o")]));
        assert!(source.contains("// Unknown math operation 'modulo'"));
        assert!(source.contains("o = x + y;"));
    }

    #[test]
    fn test_filter_modes() {
        let module = FilterModule::new();
        let outputs = bindings(&[("output", "out")]);

        let identity = module.generate_source(&bindings(&[("input", "c")]), &outputs);
        assert_eq!(identity, "    out = c;\n");

        let invert = module.generate_source(
            &bindings(&[("input", "c"), ("strength", "0.5"), ("filterType", "invert")]),
            &outputs,
        );
        assert_eq!(invert, "    out = mix(c, vec3(1.0) - c, 0.5);\n");
    }

    #[test]
    fn test_operator_categories() {
        for module in [blend(), transform(), color()] {
            assert_eq!(module.category(), ModuleCategory::Operator);
        }
        assert_eq!(MathModule::new().category(), ModuleCategory::Operator);
        assert_eq!(FilterModule::new().category(), ModuleCategory::Operator);
        assert!(blend().input_port("base").unwrap().needs_value());
    }
}
