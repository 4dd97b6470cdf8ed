//! Configuration merging.
//!
//! Combines a descriptor's default configuration with host overrides.
//! Top-level keys are replaced; nested objects present on both sides are
//! merged one level deep unless the patch marks the key as replaced.

use crate::core::JsonMap;
use crate::plugin::descriptor::PluginConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Nested objects deeper than this are replaced wholesale.
const NESTED_MERGE_DEPTH: usize = 1;

/// Partial configuration used for overrides and updates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    /// Override for `enabled`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Override for `autoLoad`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_load: Option<bool>,
    /// Extension keys applied wholesale instead of merged
    #[serde(default, rename = "$replace", skip_serializing_if = "BTreeSet::is_empty")]
    pub replaced: BTreeSet<String>,
    /// Overrides for plugin-specific keys
    #[serde(flatten)]
    pub extensions: JsonMap,
}

impl ConfigPatch {
    /// Patch that only sets `enabled`.
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    /// Patch that only sets `autoLoad`.
    pub fn auto_load(auto_load: bool) -> Self {
        Self {
            auto_load: Some(auto_load),
            ..Default::default()
        }
    }

    /// Add an extension override.
    pub fn with_extension(mut self, key: &str, value: Value) -> Self {
        self.extensions.insert(key.to_string(), value);
        self
    }

    /// Add an extension override that replaces the key wholesale.
    pub fn replacing(mut self, key: &str, value: Value) -> Self {
        self.extensions.insert(key.to_string(), value);
        self.replaced.insert(key.to_string());
        self
    }

    /// Whether applying this patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.auto_load.is_none() && self.extensions.is_empty()
    }

    /// Fold `later` on top of this patch.
    ///
    /// Applying the result equals applying `self` then `later`, whatever
    /// the base configuration.
    pub fn combine(&self, later: &ConfigPatch) -> ConfigPatch {
        let mut extensions = self.extensions.clone();
        let mut replaced = self.replaced.clone();

        for (key, value) in &later.extensions {
            let (combined, wholesale) = match (self.extensions.get(key), value) {
                (_, Value::Object(_)) if later.replaced.contains(key) => (value.clone(), true),
                (Some(Value::Object(old)), Value::Object(new)) => (
                    Value::Object(merge_maps(old, new, NESTED_MERGE_DEPTH - 1)),
                    self.replaced.contains(key),
                ),
                // A scalar earlier in the chain already discarded the base object.
                (Some(_), Value::Object(_)) => (value.clone(), true),
                _ => (value.clone(), false),
            };
            if wholesale {
                replaced.insert(key.clone());
            } else {
                replaced.remove(key);
            }
            extensions.insert(key.clone(), combined);
        }

        ConfigPatch {
            enabled: later.enabled.or(self.enabled),
            auto_load: later.auto_load.or(self.auto_load),
            replaced,
            extensions,
        }
    }
}

impl From<PluginConfig> for ConfigPatch {
    fn from(config: PluginConfig) -> Self {
        Self {
            enabled: Some(config.enabled),
            auto_load: Some(config.auto_load),
            replaced: BTreeSet::new(),
            extensions: config.extensions,
        }
    }
}

/// Merge defaults with optional overrides into an effective configuration.
pub fn merge(defaults: &PluginConfig, overrides: Option<&ConfigPatch>) -> PluginConfig {
    let Some(patch) = overrides else {
        return defaults.clone();
    };

    PluginConfig {
        enabled: patch.enabled.unwrap_or(defaults.enabled),
        auto_load: patch.auto_load.unwrap_or(defaults.auto_load),
        extensions: apply_extensions(&defaults.extensions, patch),
    }
}

fn apply_extensions(base: &JsonMap, patch: &ConfigPatch) -> JsonMap {
    let mut merged = merge_maps(base, &patch.extensions, NESTED_MERGE_DEPTH);
    for key in &patch.replaced {
        if let Some(value) = patch.extensions.get(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Merge two JSON objects, recursing into shared object keys `depth` levels.
pub fn merge_maps(base: &JsonMap, overrides: &JsonMap, depth: usize) -> JsonMap {
    let mut merged = base.clone();
    for (key, value) in overrides {
        let combined = match (merged.get(key), value) {
            (Some(Value::Object(old)), Value::Object(new)) if depth > 0 => {
                Value::Object(merge_maps(old, new, depth - 1))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}
