//! Weather and general information lookup.

use crate::plugin::descriptor::{Component, PluginConfig};
use crate::plugin::validation::{CandidateMeta, PluginCandidate};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Info plugin settings block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfoSettings {
    pub default_city: String,
    pub api_key: String,
}

impl InfoSettings {
    /// Read the settings block of an effective configuration.
    pub fn from_config(config: &PluginConfig) -> Option<Self> {
        config.get_extension("settings")
    }
}

/// Info plugin candidate.
pub fn candidate() -> PluginCandidate {
    let meta = CandidateMeta::new("info", "信息", "2.0.0")
        .with_author("sloan")
        .with_description("查询天气、股票等综合信息")
        .with_icon("ℹ️");

    PluginCandidate::new(meta)
        .with_config(json!({
            "enabled": true,
            "autoLoad": true,
            "settings": {
                "defaultCity": "Beijing",
                "apiKey": ""
            }
        }))
        .with_renderable(Component::shared("InfoPlugin"))
}

crate::plugin_module!("info", 20, candidate);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::merge::{merge, ConfigPatch};
    use crate::plugin::validation::validate;

    #[test]
    fn test_default_settings() {
        let descriptor = validate(candidate()).unwrap();
        assert_eq!(descriptor.meta.name, "信息");
        assert_eq!(descriptor.meta.version, "2.0.0");
        let settings = InfoSettings::from_config(&descriptor.config).unwrap();
        assert_eq!(settings.default_city, "Beijing");
        assert!(settings.api_key.is_empty());
        // autoLoad without an install hook needs no install.
        assert!(!descriptor.wants_install(&descriptor.config));
    }

    #[test]
    fn test_city_override_keeps_api_key() {
        let descriptor = validate(candidate()).unwrap();
        let patch = ConfigPatch::default()
            .with_extension("settings", json!({ "defaultCity": "Shanghai" }));

        let effective = merge(&descriptor.config, Some(&patch));
        let settings = InfoSettings::from_config(&effective).unwrap();
        assert_eq!(settings.default_city, "Shanghai");
        assert_eq!(effective.lookup("settings.apiKey"), Some(&json!("")));
    }
}
