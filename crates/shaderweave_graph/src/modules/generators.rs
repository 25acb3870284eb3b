// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generator modules: values produced from the coordinate/time context.

use super::{TIME_VARIABLE, UV_VARIABLE};
use crate::module::{ModuleCategory, ModuleDefinition};
use crate::port::{DataType, Port};
use crate::registry::ModuleRegistry;

/// Coordinate input shared by all generators
fn uv_port() -> Port {
    Port::input("uv", DataType::Vec2).required().with_default(UV_VARIABLE)
}

/// Time input shared by animated generators
fn time_port() -> Port {
    Port::input("time", DataType::Scalar).with_default(TIME_VARIABLE)
}

/// Simplex noise
pub fn noise() -> ModuleDefinition {
    ModuleDefinition::new("noise", ModuleCategory::Generator)
        .describe("Simplex noise")
        .port(uv_port())
        .port(Port::input("scale", DataType::Scalar).with_default("3.0"))
        .port(time_port())
        .port(Port::output("output", DataType::Scalar))
        .include("generative/snoise.glsl")
        .parameter("scale", "3.0")
        .parameter("timeMultiplier", "0.1")
        .template("    {output} = snoise({uv} * {scale} + {time} * {timeMultiplier});\n")
}

/// Voronoi cells
pub fn voronoi() -> ModuleDefinition {
    ModuleDefinition::new("voronoi", ModuleCategory::Generator)
        .describe("Voronoi cellular pattern")
        .port(uv_port())
        .port(Port::input("scale", DataType::Scalar).with_default("5.0"))
        .port(time_port())
        .port(Port::output("distance", DataType::Scalar))
        .port(Port::output("cellId", DataType::Scalar))
        .include("generative/voronoi.glsl")
        .parameter("scale", "5.0")
        .parameter("timeMultiplier", "0.05")
        .template(concat!(
            "    vec3 voronoiResult = voronoi({uv} * {scale} + {time} * {timeMultiplier});\n",
            "    {distance} = voronoiResult.x;\n",
            "    {cellId} = voronoiResult.y;\n",
        ))
}

/// Linear gradient, normalized to 0..1
pub fn gradient() -> ModuleDefinition {
    ModuleDefinition::new("gradient", ModuleCategory::Generator)
        .describe("Linear gradient")
        .port(uv_port())
        .port(Port::input("direction", DataType::Vec2).with_default("vec2(1.0, 0.0)"))
        .port(Port::input("center", DataType::Vec2).with_default("vec2(0.5)"))
        .port(Port::output("output", DataType::Scalar))
        .parameter("direction", "vec2(1.0, 0.0)")
        .parameter("center", "vec2(0.5)")
        .template(concat!(
            "    vec2 gradientUV = {uv} - {center};\n",
            "    {output} = dot(gradientUV, normalize({direction})) * 0.5 + 0.5;\n",
        ))
}

/// Per-cell random value
pub fn random() -> ModuleDefinition {
    ModuleDefinition::new("random", ModuleCategory::Generator)
        .describe("Random value per grid cell")
        .port(uv_port())
        .port(Port::input("scale", DataType::Scalar).with_default("10.0"))
        .port(Port::input("seed", DataType::Scalar).with_default("0.0"))
        .port(Port::output("output", DataType::Scalar))
        .include("generative/random.glsl")
        .parameter("scale", "10.0")
        .parameter("seed", "0.0")
        .template(concat!(
            "    vec2 gridPos = floor({uv} * {scale});\n",
            "    {output} = random(gridPos + {seed});\n",
        ))
}

/// Fractal Brownian motion
pub fn fbm() -> ModuleDefinition {
    ModuleDefinition::new("fbm", ModuleCategory::Generator)
        .describe("Fractal Brownian motion")
        .port(uv_port())
        .port(Port::input("octaves", DataType::Scalar).with_default("4.0"))
        .port(Port::input("scale", DataType::Scalar).with_default("3.0"))
        .port(time_port())
        .port(Port::output("output", DataType::Scalar))
        .include("generative/fbm.glsl")
        .parameter("octaves", "4.0")
        .parameter("scale", "3.0")
        .parameter("timeMultiplier", "0.1")
        .template("    {output} = fbm({uv} * {scale} + {time} * {timeMultiplier});\n")
}

/// Register all generators
pub fn register_generators(registry: &mut ModuleRegistry) {
    for definition in [noise(), voronoi(), gradient(), random(), fbm()] {
        registry.register_definition(definition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{PortBindings, ShaderModule};

    #[test]
    fn test_generators_default_to_implicit_context() {
        for module in [noise(), voronoi(), gradient(), random(), fbm()] {
            let uv = module.input_port("uv").unwrap();
            assert_eq!(uv.default_expression.as_deref(), Some(UV_VARIABLE));
            assert_eq!(module.category(), ModuleCategory::Generator);
        }
    }

    #[test]
    fn test_voronoi_assigns_both_outputs() {
        let module = voronoi();
        let inputs = PortBindings::from([
            ("uv".to_string(), "uv".to_string()),
            ("scale".to_string(), "5.0".to_string()),
            ("time".to_string(), "iTime".to_string()),
            ("timeMultiplier".to_string(), "0.05".to_string()),
        ]);
        let outputs = PortBindings::from([
            ("distance".to_string(), "node4_distance".to_string()),
            ("cellId".to_string(), "node4_cellId".to_string()),
        ]);

        let source = module.generate_source(&inputs, &outputs);
        assert!(source.contains("voronoi(uv * 5.0 + iTime * 0.05)"));
        assert!(source.contains("node4_distance = voronoiResult.x;"));
        assert!(source.contains("node4_cellId = voronoiResult.y;"));
    }

    #[test]
    fn test_gradient_has_no_includes() {
        assert!(gradient().required_includes().is_empty());
        assert_eq!(
            noise().required_includes().into_iter().collect::<Vec<_>>(),
            vec!["generative/snoise.glsl".to_string()]
        );
    }
}
