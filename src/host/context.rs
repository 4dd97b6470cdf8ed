//! Application context handed to install hooks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Host state a plugin may read or extend while installing.
#[derive(Clone, Debug)]
pub struct AppContext {
    /// Host-wide settings
    pub settings: HashMap<String, serde_json::Value>,
    /// Directory plugins may use for their data
    pub data_dir: PathBuf,
    /// Is development mode
    pub dev_mode: bool,
    installed: Vec<String>,
}

impl AppContext {
    /// Create a new context.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            settings: HashMap::new(),
            data_dir: data_dir.as_ref().to_path_buf(),
            dev_mode: false,
            installed: Vec::new(),
        }
    }

    /// Set development mode.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Get setting value.
    pub fn get_setting<T: for<'de> serde::Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.settings
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set setting value.
    pub fn set_setting(&mut self, key: &str, value: serde_json::Value) {
        self.settings.insert(key.to_string(), value);
    }

    /// Plugins whose install hook completed, in install order.
    pub fn installed(&self) -> &[String] {
        &self.installed
    }

    /// Data directory for one plugin.
    pub fn plugin_dir(&self, id: &str) -> PathBuf {
        self.data_dir.join(id)
    }

    pub(crate) fn mark_installed(&mut self, id: &str) {
        self.installed.push(id.to_string());
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("plugin-host"))
    }
}
