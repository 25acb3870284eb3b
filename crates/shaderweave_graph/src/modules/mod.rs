// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in generator and operator modules.

pub mod generators;
pub mod operators;

use crate::registry::ModuleRegistry;

/// Name of the implicit coordinate variable available to every node function
pub const UV_VARIABLE: &str = "uv";

/// Name of the implicit time variable available to every node function
pub const TIME_VARIABLE: &str = "iTime";

/// Register every built-in module into a registry
pub fn register_builtin_modules(registry: &mut ModuleRegistry) {
    generators::register_generators(registry);
    operators::register_operators(registry);
}
