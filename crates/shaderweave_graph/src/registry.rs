// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of available module types.

use crate::module::{ModuleCategory, ModuleDefinition, ShaderModule};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Zero-argument constructor for a module type
pub type ModuleFactory = Arc<dyn Fn() -> Box<dyn ShaderModule> + Send + Sync>;

/// Registry of module types by name.
///
/// Built once at startup and shared read-only through an `Arc`.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    factories: IndexMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in generator and operator
    pub fn with_builtin_modules() -> Self {
        let mut registry = Self::new();
        crate::modules::register_builtin_modules(&mut registry);
        registry
    }

    /// Register a module factory. An existing entry with the same name is replaced.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ShaderModule> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self.factories.insert(type_name.clone(), Arc::new(factory)).is_some() {
            tracing::debug!("Replaced module registration: {}", type_name);
        } else {
            tracing::trace!("Registered module: {}", type_name);
        }
    }

    /// Register a data-driven module definition under its own name
    pub fn register_definition(&mut self, definition: ModuleDefinition) {
        let name = definition.name.clone();
        let definition = Arc::new(definition);
        self.register(name, move || Box::new(ModuleDefinition::clone(&definition)));
    }

    /// Instantiate a fresh module
    pub fn create(&self, type_name: &str) -> Result<Box<dyn ShaderModule>, RegistryError> {
        self.factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::NotFound(type_name.to_string()))
    }

    /// Check whether a type is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// All registered type names
    pub fn list_types(&self) -> BTreeSet<String> {
        self.factories.keys().cloned().collect()
    }

    /// Registered type names in a category
    pub fn types_in_category(&self, category: ModuleCategory) -> Vec<String> {
        self.factories
            .iter()
            .filter(|(_, factory)| factory().category() == category)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Error when looking up a module type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No factory registered under this name
    #[error("Unknown module type: {0}")]
    NotFound(String),
}
