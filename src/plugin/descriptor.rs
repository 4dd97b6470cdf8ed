//! Plugin descriptor definition.
//!
//! Defines what a plugin module exports: identity, default configuration,
//! a renderable handle, route contributions and an optional install hook.

use crate::core::JsonMap;
use crate::host::AppContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Plugin identity and presentation data.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PluginMeta {
    /// Plugin ID (registry key)
    pub id: String,
    /// Display name
    pub name: String,
    /// Version
    pub version: String,
    /// Author
    pub author: String,
    /// Description
    pub description: String,
    /// Icon (emoji or asset key)
    pub icon: String,
    /// Homepage URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl PluginMeta {
    /// Create new plugin meta.
    pub fn new(id: &str, name: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    /// Set author.
    pub fn with_author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    /// Set description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    /// Set icon.
    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = icon.to_string();
        self
    }

    /// Set homepage.
    pub fn with_homepage(mut self, url: &str) -> Self {
        self.homepage = Some(url.to_string());
        self
    }
}

// Identity is the id alone.
impl PartialEq for PluginMeta {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PluginMeta {}

/// Plugin configuration: typed base keys plus plugin-specific extensions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// Whether the plugin is shown by the host
    #[serde(default)]
    pub enabled: bool,
    /// Whether the install hook runs at startup
    #[serde(default)]
    pub auto_load: bool,
    /// Plugin-specific keys (`settings`, `defaultCity`, ...)
    #[serde(flatten)]
    pub extensions: JsonMap,
}

impl PluginConfig {
    /// Create a config with the two recognized flags.
    pub fn new(enabled: bool, auto_load: bool) -> Self {
        Self {
            enabled,
            auto_load,
            extensions: JsonMap::new(),
        }
    }

    /// Add a plugin-specific key.
    pub fn with_extension(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extensions.insert(key.to_string(), value);
        self
    }

    /// Get a plugin-specific key, deserialized.
    pub fn get_extension<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.extensions
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Look up a value by dotted path, e.g. `settings.defaultCity`.
    pub fn lookup(&self, path: &str) -> Option<&serde_json::Value> {
        let mut parts = path.split('.');
        let mut current = self.extensions.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

/// Opaque handle to the unit the host renders for a plugin.
pub trait Renderable: Send + Sync + fmt::Debug {
    /// Key the host uses to resolve the view.
    fn component(&self) -> &str;
}

/// A renderable identified by component name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    name: String,
}

impl Component {
    /// Create a component handle.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Wrap into a shared renderable handle.
    pub fn shared(name: &str) -> Arc<dyn Renderable> {
        Arc::new(Self::new(name))
    }
}

impl Renderable for Component {
    fn component(&self) -> &str {
        &self.name
    }
}

/// A navigation record a plugin contributes to the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteContribution {
    /// Route path, starting with `/`
    pub path: String,
    /// Route name
    pub name: String,
    /// Component key mounted at this route
    pub component: String,
}

impl RouteContribution {
    /// Create a route contribution.
    pub fn new(path: &str, name: &str, component: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            component: component.to_string(),
        }
    }
}

/// Result type for install hooks.
pub type HookResult = std::result::Result<(), HookError>;

/// Failure reported by a plugin's install hook.
#[derive(Clone, Debug)]
pub struct HookError {
    /// Error message
    pub message: String,
}

impl HookError {
    /// Create a new error.
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HookError {}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Lifecycle hook invoked once when an `autoLoad` plugin is installed.
#[async_trait]
pub trait InstallHook: Send + Sync {
    /// Perform setup against the host context.
    async fn install(&self, ctx: &mut AppContext) -> HookResult;
}

/// The validated, immutable declaration of a plugin.
#[derive(Clone)]
pub struct PluginDescriptor {
    /// Identity
    pub meta: PluginMeta,
    /// Default configuration
    pub config: PluginConfig,
    /// Renderable unit
    pub renderable: Arc<dyn Renderable>,
    /// Route contributions, in declaration order
    pub routes: Vec<RouteContribution>,
    /// Optional install hook
    pub install: Option<Arc<dyn InstallHook>>,
}

impl PluginDescriptor {
    /// Create a descriptor without routes or install hook.
    pub fn new(meta: PluginMeta, config: PluginConfig, renderable: Arc<dyn Renderable>) -> Self {
        Self {
            meta,
            config,
            renderable,
            routes: Vec::new(),
            install: None,
        }
    }

    /// Add a route contribution.
    pub fn with_route(mut self, route: RouteContribution) -> Self {
        self.routes.push(route);
        self
    }

    /// Attach an install hook.
    pub fn with_install(mut self, hook: Arc<dyn InstallHook>) -> Self {
        self.install = Some(hook);
        self
    }

    /// Registry key.
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Whether the given configuration asks for the install hook to run.
    pub fn wants_install(&self, config: &PluginConfig) -> bool {
        config.auto_load && self.install.is_some()
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("meta", &self.meta)
            .field("config", &self.config)
            .field("renderable", &self.renderable.component())
            .field("routes", &self.routes)
            .field("install", &self.install.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plugin_meta() {
        let meta = PluginMeta::new("finance", "Finance", "1.0.0")
            .with_author("Sloan")
            .with_icon("💰")
            .with_description("Live quotes");

        assert_eq!(meta.id, "finance");
        assert_eq!(meta.author, "Sloan");
        assert!(meta.homepage.is_none());
    }

    #[test]
    fn test_meta_equality_uses_id_only() {
        let a = PluginMeta::new("info", "Info", "1.0.0");
        let b = PluginMeta::new("info", "Weather", "2.0.0");
        assert_eq!(a, b);
        assert_ne!(a, PluginMeta::new("finance", "Info", "1.0.0"));
    }

    #[test]
    fn test_config_serde_shape() {
        let config = PluginConfig::new(true, false)
            .with_extension("settings", json!({ "defaultCity": "Beijing" }));

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(
            value,
            json!({ "enabled": true, "autoLoad": false, "settings": { "defaultCity": "Beijing" } })
        );

        let parsed: PluginConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_flags_default_to_false() {
        let parsed: PluginConfig = serde_json::from_value(json!({ "apiKey": "x" })).unwrap();
        assert!(!parsed.enabled);
        assert!(!parsed.auto_load);
        assert_eq!(parsed.get_extension::<String>("apiKey"), Some("x".to_string()));
    }

    #[test]
    fn test_config_lookup() {
        let config = PluginConfig::new(true, true)
            .with_extension("settings", json!({ "defaultCity": "Beijing", "apiKey": "" }));

        assert_eq!(config.lookup("settings.defaultCity"), Some(&json!("Beijing")));
        assert!(config.lookup("settings.missing").is_none());
        assert!(config.lookup("settings.defaultCity.deeper").is_none());
    }

    #[test]
    fn test_descriptor_wants_install() {
        struct Noop;

        #[async_trait]
        impl InstallHook for Noop {
            async fn install(&self, _ctx: &mut AppContext) -> HookResult {
                Ok(())
            }
        }

        let meta = PluginMeta::new("finance", "Finance", "1.0.0");
        let plain = PluginDescriptor::new(meta, PluginConfig::new(true, true), Component::shared("Finance"));
        assert!(!plain.wants_install(&plain.config));

        let hooked = plain.clone().with_install(Arc::new(Noop));
        assert!(hooked.wants_install(&hooked.config));
        assert!(!hooked.wants_install(&PluginConfig::new(true, false)));
    }

    #[test]
    fn test_hook_error_display() {
        let err: HookError = "quote feed unreachable".into();
        assert_eq!(err.to_string(), "quote feed unreachable");
    }
}
