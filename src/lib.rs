//! # plugin-host - Plugin registry and lifecycle runtime
//!
//! Composes independently authored feature modules into one host shell:
//! - **Registry**: id-keyed descriptors, effective configuration, activation state
//! - **Config merge**: defaults overlaid with persisted user overrides
//! - **Lifecycle**: discovery, validation and serialized install hooks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plugin_host::host::AppContext;
//! use plugin_host::plugin::{LifecycleDriver, PluginCatalog, PluginRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut driver = LifecycleDriver::new(PluginRegistry::new(), AppContext::default());
//!     driver.start(&PluginCatalog::builtin()).await;
//!
//!     for entry in driver.registry().list_enabled() {
//!         println!("{} {}", entry.id(), entry.descriptor().meta.version);
//!     }
//! }
//! ```

pub mod core;
pub mod host;
pub mod monitoring;
pub mod plugin;
pub mod plugins;

pub use core::error::{Error, Result};

#[doc(hidden)]
pub use inventory;
