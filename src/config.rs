//! Optimizer configuration
//!
//! ```toml
//! fold_constants = true
//! resolve_branches = true
//! eliminate_dead_stores = false
//! class_filter = "ConstantVariableFolding"
//! skip_methods = ["<init>"]
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Which passes run, and on which classes and methods
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Fold arithmetic, conversions and `lcmp`
    pub fold_constants: bool,

    /// Resolve conditional branches with known operands
    pub resolve_branches: bool,

    /// Run the dead-store pass after folding
    pub eliminate_dead_stores: bool,

    /// Only classes whose name contains this substring are optimized
    pub class_filter: Option<String>,

    /// Methods left untouched, by name
    pub skip_methods: Vec<String>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            fold_constants: true,
            resolve_branches: true,
            eliminate_dead_stores: true,
            class_filter: None,
            skip_methods: Vec::new(),
        }
    }
}

impl OptimizerConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Whether the class with this name is optimized at all
    pub fn accepts_class(&self, name: &str) -> bool {
        self.class_filter
            .as_deref()
            .map_or(true, |filter| name.contains(filter))
    }

    /// Whether the method with this name is optimized
    pub fn accepts_method(&self, name: &str) -> bool {
        !self.skip_methods.iter().any(|skipped| skipped == name)
    }
}
