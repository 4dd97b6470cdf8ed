//! Descriptor validation.
//!
//! Turns the loosely-typed candidate a plugin module exports into a
//! `PluginDescriptor`, or reports the first malformed field.

use crate::core::{Error, JsonMap, Result};
use crate::plugin::descriptor::{
    InstallHook, PluginConfig, PluginDescriptor, PluginMeta, Renderable, RouteContribution,
};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// `enabled` when the candidate does not declare it.
pub const DEFAULT_ENABLED: bool = true;

/// `autoLoad` when the candidate does not declare it.
pub const DEFAULT_AUTO_LOAD: bool = false;

/// Candidate identity, every field optional until validated.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CandidateMeta {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub homepage: Option<String>,
}

impl CandidateMeta {
    /// Create candidate meta with the identifying fields.
    pub fn new(id: &str, name: &str, version: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            version: Some(version.to_string()),
            ..Default::default()
        }
    }

    /// Set author.
    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// Set description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Set icon.
    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }
}

/// The unvalidated shape a plugin module exports.
#[derive(Clone, Default)]
pub struct PluginCandidate {
    /// Identity
    pub meta: CandidateMeta,
    /// Raw configuration object
    pub config: Option<Value>,
    /// Renderable unit
    pub renderable: Option<Arc<dyn Renderable>>,
    /// Route contributions
    pub routes: Vec<RouteContribution>,
    /// Install hook
    pub install: Option<Arc<dyn InstallHook>>,
}

impl PluginCandidate {
    /// Create a candidate from its meta.
    pub fn new(meta: CandidateMeta) -> Self {
        Self {
            meta,
            ..Default::default()
        }
    }

    /// Build a candidate from a JSON manifest holding `meta` and `config`.
    pub fn from_manifest(manifest: Value) -> Result<Self> {
        #[derive(Deserialize)]
        struct Manifest {
            #[serde(default)]
            meta: CandidateMeta,
            #[serde(default)]
            config: Option<Value>,
            #[serde(default)]
            routes: Vec<RouteContribution>,
        }

        let manifest: Manifest = serde_json::from_value(manifest)?;
        Ok(Self {
            meta: manifest.meta,
            config: manifest.config,
            renderable: None,
            routes: manifest.routes,
            install: None,
        })
    }

    /// Set the raw configuration object.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the renderable unit.
    pub fn with_renderable(mut self, renderable: Arc<dyn Renderable>) -> Self {
        self.renderable = Some(renderable);
        self
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

    /// Declared id, if any, for reporting.
    pub fn declared_id(&self) -> Option<&str> {
        self.meta.id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

impl fmt::Debug for PluginCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCandidate")
            .field("meta", &self.meta)
            .field("config", &self.config)
            .field("renderable", &self.renderable.is_some())
            .field("routes", &self.routes)
            .field("install", &self.install.is_some())
            .finish()
    }
}

/// Validate a candidate into a descriptor.
pub fn validate(candidate: PluginCandidate) -> Result<PluginDescriptor> {
    let id = required_text(candidate.meta.id, "meta.id")?;
    let name = required_text(candidate.meta.name, "meta.name")?;

    let mut extensions = match candidate.config {
        None | Some(Value::Null) => JsonMap::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(Error::validation(
                "config",
                format!("must be an object, got {}", json_kind(&other)),
            ))
        }
    };

    let enabled = take_flag(&mut extensions, "enabled", DEFAULT_ENABLED)?;
    let auto_load = take_flag(&mut extensions, "autoLoad", DEFAULT_AUTO_LOAD)?;

    let renderable = candidate
        .renderable
        .ok_or_else(|| Error::validation("renderable", "must be present"))?;

    for (index, route) in candidate.routes.iter().enumerate() {
        if !route.path.starts_with('/') {
            return Err(Error::validation(
                &format!("routes[{}].path", index),
                format!("must start with '/', got {:?}", route.path),
            ));
        }
    }

    let meta = PluginMeta {
        id,
        name,
        version: candidate.meta.version.unwrap_or_default(),
        author: candidate.meta.author.unwrap_or_default(),
        description: candidate.meta.description.unwrap_or_default(),
        icon: candidate.meta.icon.unwrap_or_default(),
        homepage: candidate.meta.homepage,
    };

    Ok(PluginDescriptor {
        meta,
        config: PluginConfig {
            enabled,
            auto_load,
            extensions,
        },
        renderable,
        routes: candidate.routes,
        install: candidate.install,
    })
}

/// Check the invariants of an already-typed descriptor.
pub fn check_descriptor(descriptor: &PluginDescriptor) -> Result<()> {
    if descriptor.meta.id.trim().is_empty() {
        return Err(Error::validation("meta.id", "must not be empty"));
    }
    if descriptor.meta.name.trim().is_empty() {
        return Err(Error::validation("meta.name", "must not be empty"));
    }
    Ok(())
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        Some(_) => Err(Error::validation(field, "must not be empty")),
        None => Err(Error::validation(field, "is missing")),
    }
}

fn take_flag(config: &mut JsonMap, key: &str, default: bool) -> Result<bool> {
    let field = format!("config.{}", key);
    match config.remove(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => coerce_bool(&value).ok_or_else(|| {
            Error::validation(
                &field,
                format!("is not coercible to boolean: {}", value),
            )
        }),
    }
}

/// Accepts booleans, "true"/"false" and the numbers 0/1.
fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
