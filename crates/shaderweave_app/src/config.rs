// SPDX-License-Identifier: MIT OR Apache-2.0
//! Driver configuration.
//!
//! Stored as RON. Every field has a default so partial files are accepted.

use serde::{Deserialize, Serialize};
use shaderweave_graph::codegen::{CodegenOptions, DEFAULT_GLSL_VERSION};
use shaderweave_graph::compiler::CompilerOptions;
use shaderweave_graph::include::DEFAULT_INCLUDE_EXTENSIONS;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Configuration file looked up when none is given
pub const DEFAULT_CONFIG_FILE: &str = "shaderweave.ron";

/// Error when loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Not valid configuration RON
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Configuration could not be written
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    /// Written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest version understood
        supported: u32,
    },
}

/// Driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Settings format version
    pub version: u32,
    /// Directory holding the include library
    pub include_root: PathBuf,
    /// Directory generated shaders are written to
    pub output_dir: PathBuf,
    /// Value of the `#version` directive
    pub glsl_version: String,
    /// Watch for changes and recompile
    pub hot_reload: bool,
    /// How often the watch loop drains events
    pub poll_interval_ms: u64,
    /// File event debounce window
    pub debounce_ms: u64,
    /// Extensions treated as library files
    pub include_extensions: Vec<String>,
    /// Reject connections between incompatible port types
    pub strict_port_types: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            include_root: PathBuf::from("lygia"),
            output_dir: PathBuf::from("out"),
            glsl_version: DEFAULT_GLSL_VERSION.to_string(),
            hot_reload: false,
            poll_interval_ms: 100,
            debounce_ms: 250,
            include_extensions: DEFAULT_INCLUDE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            strict_port_types: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig =
            ron::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Compiler settings derived from this configuration
    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            codegen: CodegenOptions {
                glsl_version: self.glsl_version.clone(),
            },
            track_includes: self.hot_reload,
        }
    }

    /// Watch loop poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// File event debounce window
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Where the fragment source for `graph_name` is written
    pub fn output_path(&self, graph_name: &str) -> PathBuf {
        let stem: String = graph_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let stem = if stem.is_empty() { "graph".to_string() } else { stem };
        self.output_dir.join(format!("{stem}.frag"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.version, CONFIG_FORMAT_VERSION);
        assert_eq!(config.glsl_version, "410 core");
        assert!(!config.strict_port_types);
        assert!(config.include_extensions.iter().any(|e| e == "glsl"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        let config = AppConfig {
            glsl_version: "330 core".to_string(),
            hot_reload: true,
            ..AppConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.ron");
        std::fs::write(&path, "(include_root: \"shaders/lib\", strict_port_types: true)").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.include_root, PathBuf::from("shaders/lib"));
        assert!(config.strict_port_types);
        assert_eq!(config.debounce_ms, 250);
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.ron");
        std::fs::write(&path, "(version: 7)").unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::UnsupportedVersion { found: 7, supported: 1 })
        ));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_output_path_and_options() {
        let config = AppConfig {
            output_dir: PathBuf::from("build"),
            hot_reload: true,
            ..AppConfig::default()
        };
        assert_eq!(config.output_path("Noise Demo"), PathBuf::from("build/Noise_Demo.frag"));
        assert_eq!(config.output_path(""), PathBuf::from("build/graph.frag"));

        let options = config.compiler_options();
        assert!(options.track_includes);
        assert_eq!(options.codegen.glsl_version, "410 core");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }
}
