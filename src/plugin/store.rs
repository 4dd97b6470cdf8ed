//! Override persistence.
//!
//! The registry reads and writes user overrides through `OverrideStore`;
//! where they live is up to the host.

use crate::core::{Error, Result};
use crate::plugin::merge::ConfigPatch;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Storage for per-plugin configuration overrides.
pub trait OverrideStore: Send + Sync {
    /// Load the overrides in effect for a plugin.
    fn load_overrides(&self, id: &str) -> Result<Option<ConfigPatch>>;

    /// Load only the overrides `save_overrides` writes.
    fn load_saved_overrides(&self, id: &str) -> Result<Option<ConfigPatch>> {
        self.load_overrides(id)
    }

    /// Persist the overrides for a plugin.
    fn save_overrides(&self, id: &str, overrides: &ConfigPatch) -> Result<()>;
}

/// In-process override store.
#[derive(Debug, Default)]
pub struct MemoryOverrideStore {
    overrides: RwLock<HashMap<String, ConfigPatch>>,
}

impl MemoryOverrideStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with overrides.
    pub fn with_overrides(overrides: HashMap<String, ConfigPatch>) -> Self {
        Self {
            overrides: RwLock::new(overrides),
        }
    }
}

impl OverrideStore for MemoryOverrideStore {
    fn load_overrides(&self, id: &str) -> Result<Option<ConfigPatch>> {
        let overrides = self
            .overrides
            .read()
            .map_err(|_| Error::Persistence("override store lock poisoned".to_string()))?;
        Ok(overrides.get(id).cloned())
    }

    fn save_overrides(&self, id: &str, patch: &ConfigPatch) -> Result<()> {
        let mut overrides = self
            .overrides
            .write()
            .map_err(|_| Error::Persistence("override store lock poisoned".to_string()))?;
        overrides.insert(id.to_string(), patch.clone());
        Ok(())
    }
}

/// Overrides kept in one JSON document mapping plugin id to patch.
#[derive(Debug)]
pub struct JsonFileOverrideStore {
    path: PathBuf,
    cache: RwLock<BTreeMap<String, ConfigPatch>>,
}

impl JsonFileOverrideStore {
    /// Open a store; a missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, snapshot: &BTreeMap<String, ConfigPatch>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // Write a sibling file, then rename over the original.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl OverrideStore for JsonFileOverrideStore {
    fn load_overrides(&self, id: &str) -> Result<Option<ConfigPatch>> {
        let cache = self
            .cache
            .read()
            .map_err(|_| Error::Persistence("override store lock poisoned".to_string()))?;
        Ok(cache.get(id).cloned())
    }

    fn save_overrides(&self, id: &str, patch: &ConfigPatch) -> Result<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| Error::Persistence("override store lock poisoned".to_string()))?;
        cache.insert(id.to_string(), patch.clone());
        self.flush(&cache)
    }
}

/// Host-supplied overrides beneath a store of user overrides.
pub struct LayeredOverrideStore {
    host: HashMap<String, ConfigPatch>,
    user: Arc<dyn OverrideStore>,
}

impl LayeredOverrideStore {
    /// Layer `host` overrides under `user`.
    pub fn new(host: HashMap<String, ConfigPatch>, user: Arc<dyn OverrideStore>) -> Self {
        Self { host, user }
    }
}

impl OverrideStore for LayeredOverrideStore {
    fn load_overrides(&self, id: &str) -> Result<Option<ConfigPatch>> {
        let user = self.user.load_overrides(id)?;
        Ok(match (self.host.get(id), user) {
            (Some(host), Some(user)) => Some(host.combine(&user)),
            (Some(host), None) => Some(host.clone()),
            (None, user) => user,
        })
    }

    fn load_saved_overrides(&self, id: &str) -> Result<Option<ConfigPatch>> {
        self.user.load_saved_overrides(id)
    }

    fn save_overrides(&self, id: &str, patch: &ConfigPatch) -> Result<()> {
        self.user.save_overrides(id, patch)
    }
}
