// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for module inputs/outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Data type that can flow through ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Single floating point value
    Scalar,
    /// 2D vector (coordinates)
    Vec2,
    /// 3D vector (RGB color)
    Vec3,
    /// 4D vector (RGBA color)
    Vec4,
    /// Texture sampler
    Texture,
}

impl DataType {
    /// GLSL type name used when declaring variables of this type
    pub fn glsl_name(&self) -> &'static str {
        match self {
            Self::Scalar => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Texture => "sampler2D",
        }
    }

    /// Number of components, zero for textures
    pub fn components(&self) -> u32 {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
            Self::Texture => 0,
        }
    }

    /// Zero literal used as a placeholder for inputs nothing feeds
    pub fn zero_literal(&self) -> &'static str {
        match self {
            Self::Scalar => "0.0",
            Self::Vec2 => "vec2(0.0)",
            Self::Vec3 => "vec3(0.0)",
            Self::Vec4 => "vec4(0.0)",
            // No literal exists for samplers; the comment keeps the gap visible.
            Self::Texture => "/* unbound sampler */",
        }
    }

    /// Check if a value of this type can feed a port of another type
    pub fn can_connect_to(&self, other: &DataType) -> bool {
        if self == other {
            return true;
        }

        match (self, other) {
            (Self::Texture, _) | (_, Self::Texture) => false,
            // Scalars broadcast to any vector
            (Self::Scalar, _) => true,
            // Vectors widen, never narrow
            _ => self.components() < other.components(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// A typed, named slot on a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique among the module's ports of the same direction
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub data_type: DataType,
    /// Whether an input must be fed by a connection, override or default
    pub required: bool,
    /// Source expression used when nothing is connected (for inputs)
    pub default_expression: Option<String>,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            data_type,
            required: false,
            default_expression: None,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            data_type,
            required: true,
            default_expression: None,
        }
    }

    /// Set the default expression
    pub fn with_default(mut self, expression: impl Into<String>) -> Self {
        self.default_expression = Some(expression.into());
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Whether this is an input port
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Whether an unconnected input has nothing to fall back on
    pub fn needs_value(&self) -> bool {
        self.is_input() && self.required && self.default_expression.is_none()
    }
}
