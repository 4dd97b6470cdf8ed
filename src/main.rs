//! Plugin host shell.
//!
//! Loads layered configuration from the working directory, starts every
//! built-in plugin and prints the resulting navigation.

use plugin_host::host::{HostConfig, RouteTable};
use plugin_host::monitoring::init_logging;
use plugin_host::plugin::{LifecycleDriver, PluginCatalog};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> plugin_host::Result<()> {
    let (config, source) = HostConfig::load_layered(std::env::current_dir()?)?;
    init_logging(&config.logging);
    match &source {
        Some(path) => info!(path = %path.display(), "Using host configuration"),
        None => info!("No configuration file found, using defaults"),
    }

    let mut driver = LifecycleDriver::from_config(&config)?;
    let mut events = driver.registry_mut().subscribe();
    let mut routes = RouteTable::new();

    let report = driver.start(&PluginCatalog::builtin()).await;
    routes.drain(&mut events);

    for outcome in report.failed() {
        warn!(
            plugin = outcome.id.as_deref().unwrap_or("<unknown>"),
            error = outcome.error.as_deref().unwrap_or(""),
            "Plugin did not start"
        );
    }

    for entry in driver.registry().list_enabled() {
        let meta = &entry.descriptor().meta;
        println!("{} {} {} ({})", meta.icon, meta.name, meta.version, meta.id);
    }
    for route in routes.routes() {
        println!("  {} -> {}", route.path, route.component);
    }

    driver.shutdown();
    Ok(())
}
