//! Host configuration.
//!
//! Configuration-driven registry setup, loaded from layered JSON files.

use crate::core::{Error, Result};
use crate::monitoring::LoggerConfig;
use crate::plugin::merge::ConfigPatch;
use crate::plugin::registry::DuplicatePolicy;
use crate::plugin::store::{JsonFileOverrideStore, LayeredOverrideStore, MemoryOverrideStore, OverrideStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Config files checked by `load_layered`, highest priority first.
pub const CONFIG_FILES: [&str; 3] = ["config.local.json", "config.json", "config.example.json"];

/// Host shell configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostConfig {
    /// Duplicate-id policy
    pub duplicate_policy: DuplicatePolicy,
    /// File persisting user overrides (in-memory when unset)
    pub overrides_path: Option<PathBuf>,
    /// Data directory handed to install hooks
    pub data_dir: PathBuf,
    /// Development mode flag for install hooks
    pub dev_mode: bool,
    /// Logging
    pub logging: LoggerConfig,
    /// Host-supplied overrides per plugin id
    pub plugins: HashMap<String, ConfigPatch>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Replace,
            overrides_path: None,
            data_dir: std::env::temp_dir().join("plugin-host"),
            dev_mode: false,
            logging: LoggerConfig::default(),
            plugins: HashMap::new(),
        }
    }
}

impl HostConfig {
    /// Load one config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the highest-priority config file present in `dir`.
    ///
    /// Returns the defaults and `None` when no file exists.
    pub fn load_layered(dir: impl AsRef<Path>) -> Result<(Self, Option<PathBuf>)> {
        let dir = dir.as_ref();
        for name in CONFIG_FILES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                let config = Self::from_file(&candidate)?;
                debug!(path = %candidate.display(), "Loaded config file");
                return Ok((config, Some(candidate)));
            }
            debug!(path = %candidate.display(), "Config file not present");
        }
        Ok((Self::default(), None))
    }

    /// Set the duplicate-id policy.
    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Add a host-supplied override for a plugin.
    pub fn with_plugin_override(mut self, id: &str, patch: ConfigPatch) -> Self {
        self.plugins.insert(id.to_string(), patch);
        self
    }

    /// Build the override store this configuration describes.
    ///
    /// Host-supplied `plugins` overrides sit beneath persisted user overrides.
    pub fn override_store(&self) -> Result<Arc<dyn OverrideStore>> {
        let user: Arc<dyn OverrideStore> = match &self.overrides_path {
            Some(path) => Arc::new(JsonFileOverrideStore::open(path)?),
            None => Arc::new(MemoryOverrideStore::new()),
        };
        if self.plugins.is_empty() {
            return Ok(user);
        }
        Ok(Arc::new(LayeredOverrideStore::new(self.plugins.clone(), user)))
    }
}
