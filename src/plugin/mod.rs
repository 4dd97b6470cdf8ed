//! Plugin Module
//!
//! Provides the plugin runtime:
//! - Plugin descriptors and validation
//! - Configuration merging and override persistence
//! - Plugin registry and events
//! - Catalog discovery and lifecycle driving

pub mod catalog;
pub mod descriptor;
pub mod events;
pub mod lifecycle;
pub mod merge;
pub mod registry;
pub mod store;
pub mod validation;

pub use catalog::{PluginCatalog, PluginModule};
pub use descriptor::{
    Component, HookError, HookResult, InstallHook, PluginConfig, PluginDescriptor, PluginMeta,
    Renderable, RouteContribution,
};
pub use events::{EventBus, RegistryEvent};
pub use lifecycle::{LifecycleDriver, PluginOutcome, StartupReport};
pub use merge::{merge, ConfigPatch};
pub use registry::{
    DuplicatePolicy, LifecycleStatus, PluginRegistry, RegistryEntry, SharedPluginRegistry,
};
pub use store::{JsonFileOverrideStore, LayeredOverrideStore, MemoryOverrideStore, OverrideStore};
pub use validation::{validate, PluginCandidate};
