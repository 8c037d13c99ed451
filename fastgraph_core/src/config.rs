//! Executor configuration.
//!
//! ```toml
//! session_handle = "classifier"
//! input_node = "INPUT_X"
//! output_node = "softmax"
//! kernel_timing = true
//! ```

use crate::error::{FastGraphError, FastGraphResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_session_handle() -> String {
    "fast_session".to_string()
}

fn default_input_node() -> String {
    "INPUT_X".to_string()
}

fn default_validate_order() -> bool {
    true
}

/// How a [`FastExecutor`](crate::FastExecutor) is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Kernel cache session; executors with the same handle share kernels
    #[serde(default = "default_session_handle")]
    pub session_handle: String,

    /// Node whose value is fed from the caller on every run
    #[serde(default = "default_input_node")]
    pub input_node: String,

    /// Node whose first output is returned; the last node when unset
    #[serde(default)]
    pub output_node: Option<String>,

    /// Reject graphs with edges pointing backwards in node order
    #[serde(default = "default_validate_order")]
    pub validate_order: bool,

    /// Record per-kernel compute times on the CPU device
    #[serde(default)]
    pub kernel_timing: bool,

    /// Keep the entry buffer of the most recent run for inspection.
    /// Off by default so no tensors outlive the call.
    #[serde(default)]
    pub retain_entries: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            session_handle: default_session_handle(),
            input_node: default_input_node(),
            output_node: None,
            validate_order: default_validate_order(),
            kernel_timing: false,
            retain_entries: false,
        }
    }
}

impl ExecutorConfig {
    pub fn with_session(mut self, session_handle: &str) -> Self {
        self.session_handle = session_handle.to_string();
        self
    }

    pub fn with_input_node(mut self, name: &str) -> Self {
        self.input_node = name.to_string();
        self
    }

    pub fn with_output_node(mut self, name: &str) -> Self {
        self.output_node = Some(name.to_string());
        self
    }

    pub fn with_kernel_timing(mut self, enabled: bool) -> Self {
        self.kernel_timing = enabled;
        self
    }

    pub fn with_retained_entries(mut self, enabled: bool) -> Self {
        self.retain_entries = enabled;
        self
    }

    /// Load config from a file (auto-detect format)
    pub fn from_file<P: AsRef<Path>>(path: P) -> FastGraphResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FastGraphError::config(format!("Failed to read config file: {}", e)))?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::from_toml(&contents),
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            Some("json") => Self::from_json(&contents),
            _ => Self::from_str_auto(&contents),
        }
    }

    /// Parse a config whose format is unknown, trying JSON, TOML and YAML
    pub fn from_str_auto(contents: &str) -> FastGraphResult<Self> {
        if contents.trim_start().starts_with('{') {
            return Self::from_json(contents);
        }
        Self::from_toml(contents).or_else(|_| Self::from_yaml(contents))
    }

    pub fn from_toml(contents: &str) -> FastGraphResult<Self> {
        toml::from_str(contents)
            .map_err(|e| FastGraphError::config(format!("Failed to parse TOML: {}", e)))
    }

    pub fn from_yaml(contents: &str) -> FastGraphResult<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| FastGraphError::config(format!("Failed to parse YAML: {}", e)))
    }

    pub fn from_json(contents: &str) -> FastGraphResult<Self> {
        serde_json::from_str(contents)
            .map_err(|e| FastGraphError::config(format!("Failed to parse JSON: {}", e)))
    }

    /// Find and load config file from standard search paths
    ///
    /// Search order:
    /// 1. ./fastgraph.toml, ./fastgraph.yaml or ./fastgraph.json
    /// 2. ~/.fastgraph/config.toml or ~/.fastgraph/config.yaml
    pub fn find_and_load() -> FastGraphResult<Self> {
        for path in Self::get_search_paths() {
            if path.exists() {
                log::debug!("Loading executor config from {}", path.display());
                return Self::from_file(&path);
            }
        }

        Err(FastGraphError::config(
            "No config file found in standard locations",
        ))
    }

    pub fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("fastgraph.toml"),
            PathBuf::from("fastgraph.yaml"),
            PathBuf::from("fastgraph.yml"),
            PathBuf::from("fastgraph.json"),
        ];

        if let Some(home) = dirs::home_dir() {
            let dir = home.join(".fastgraph");
            paths.push(dir.join("config.toml"));
            paths.push(dir.join("config.yaml"));
            paths.push(dir.join("config.yml"));
        }

        paths
    }
}
