//! Plugin catalog.
//!
//! The statically known plugin modules. Built-in modules register
//! themselves with the `plugin_module!` macro and are collected at link
//! time; hosts and tests may also assemble a catalog by hand.

use crate::plugin::validation::PluginCandidate;
use tracing::debug;

/// Factory a plugin module exports.
pub type ModuleFactory = fn() -> PluginCandidate;

/// A plugin module submitted for automatic discovery.
pub struct PluginModule {
    /// Module name, for diagnostics
    pub name: &'static str,
    /// Discovery order (ascending)
    pub order: u32,
    /// Produces the module's candidate
    pub factory: ModuleFactory,
}

inventory::collect!(PluginModule);

/// Register a built-in plugin module for discovery.
///
/// ```ignore
/// plugin_host::plugin_module!("weather", 40, weather::candidate);
/// ```
#[macro_export]
macro_rules! plugin_module {
    ($name:expr, $order:expr, $factory:expr) => {
        $crate::inventory::submit!($crate::plugin::catalog::PluginModule {
            name: $name,
            order: $order,
            factory: $factory,
        });
    };
}

/// Ordered list of plugin modules the lifecycle driver walks.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    modules: Vec<(String, ModuleFactory)>,
}

impl PluginCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of every module submitted with `plugin_module!`.
    pub fn builtin() -> Self {
        let mut submitted: Vec<&PluginModule> = inventory::iter::<PluginModule>().collect();
        submitted.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(b.name)));

        let modules = submitted
            .into_iter()
            .map(|module| (module.name.to_string(), module.factory))
            .collect();
        Self { modules }
    }

    /// Append a module.
    pub fn with_module(mut self, name: &str, factory: ModuleFactory) -> Self {
        self.modules.push((name.to_string(), factory));
        self
    }

    /// Module names in discovery order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Load every module, in order.
    pub fn discover(&self) -> Vec<PluginCandidate> {
        self.modules
            .iter()
            .map(|(name, factory)| {
                debug!(module = %name, "Discovered plugin module");
                factory()
            })
            .collect()
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("modules", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::descriptor::Component;
    use crate::plugin::validation::CandidateMeta;

    fn weather() -> PluginCandidate {
        PluginCandidate::new(CandidateMeta::new("weather", "Weather", "0.1.0"))
            .with_renderable(Component::shared("Weather"))
    }

    fn broken() -> PluginCandidate {
        PluginCandidate::default()
    }

    #[test]
    fn test_manual_catalog_order() {
        let catalog = PluginCatalog::new()
            .with_module("weather", weather)
            .with_module("broken", broken);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names(), vec!["weather", "broken"]);

        let candidates = catalog.discover();
        assert_eq!(candidates[0].declared_id(), Some("weather"));
        assert_eq!(candidates[1].declared_id(), None);
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = PluginCatalog::builtin();
        assert_eq!(catalog.names(), vec!["finance", "info", "log-analyzer"]);
    }
}
