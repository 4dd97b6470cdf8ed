//! Lifecycle driver.
//!
//! Walks the catalog at startup and moves each plugin through
//! `Discovered -> Validated -> Registered -> (Installing) -> Active`.
//! Install hooks run one at a time, in discovery order. A failing or
//! panicking hook marks only its own plugin `Failed`.

use crate::core::{Error, Result};
use crate::host::{AppContext, HostConfig};
use crate::plugin::catalog::PluginCatalog;
use crate::plugin::merge::ConfigPatch;
use crate::plugin::registry::{LifecycleStatus, PluginRegistry};
use crate::plugin::validation::{validate, PluginCandidate};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

/// What happened to one candidate during startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginOutcome {
    /// Declared id, if the candidate had one
    pub id: Option<String>,
    /// Statuses passed through, in order
    pub trail: Vec<LifecycleStatus>,
    /// Failure reason
    pub error: Option<String>,
}

impl PluginOutcome {
    fn discovered(id: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string),
            trail: vec![LifecycleStatus::Discovered],
            error: None,
        }
    }

    fn fail(mut self, err: &Error) -> Self {
        self.trail.push(LifecycleStatus::Failed);
        self.error = Some(err.to_string());
        self
    }

    /// Final status.
    pub fn status(&self) -> LifecycleStatus {
        self.trail
            .last()
            .copied()
            .unwrap_or(LifecycleStatus::Discovered)
    }
}

/// Result of a startup pass.
#[derive(Clone, Debug, Default)]
pub struct StartupReport {
    /// One outcome per discovered candidate, in discovery order
    pub outcomes: Vec<PluginOutcome>,
}

impl StartupReport {
    /// Outcome for a plugin id.
    pub fn get(&self, id: &str) -> Option<&PluginOutcome> {
        self.outcomes
            .iter()
            .rev()
            .find(|outcome| outcome.id.as_deref() == Some(id))
    }

    /// Ids that ended `Active`.
    pub fn active(&self) -> Vec<&str> {
        self.ids_with(LifecycleStatus::Active)
    }

    /// Outcomes that ended `Failed`.
    pub fn failed(&self) -> Vec<&PluginOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status() == LifecycleStatus::Failed)
            .collect()
    }

    fn ids_with(&self, status: LifecycleStatus) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status() == status)
            .filter_map(|outcome| outcome.id.as_deref())
            .collect()
    }
}

/// Drives plugins from discovery to activation.
#[derive(Debug)]
pub struct LifecycleDriver {
    registry: PluginRegistry,
    context: AppContext,
    torn_down: bool,
}

impl LifecycleDriver {
    /// Create a driver over a registry and host context.
    pub fn new(registry: PluginRegistry, context: AppContext) -> Self {
        Self {
            registry,
            context,
            torn_down: false,
        }
    }

    /// Create a driver from host configuration.
    pub fn from_config(config: &HostConfig) -> Result<Self> {
        let registry = PluginRegistry::with_store(config.override_store()?)
            .with_policy(config.duplicate_policy);
        let context = AppContext::new(&config.data_dir).with_dev_mode(config.dev_mode);
        Ok(Self::new(registry, context))
    }

    /// The registry.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// The registry, mutably (event subscription, direct queries).
    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    /// The host context install hooks ran against.
    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Whether `shutdown` ran.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Discover, validate, register and install every catalog module.
    pub async fn start(&mut self, catalog: &PluginCatalog) -> StartupReport {
        let candidates = catalog.discover();
        info!(count = candidates.len(), "Starting plugins");

        let mut report = StartupReport::default();
        for candidate in candidates {
            let outcome = self.admit(candidate).await;
            report.outcomes.push(outcome);
        }

        info!(
            active = report.active().len(),
            failed = report.failed().len(),
            "Plugin startup finished"
        );
        report
    }

    /// Bring a single candidate as far through the lifecycle as it goes.
    pub async fn admit(&mut self, candidate: PluginCandidate) -> PluginOutcome {
        let mut outcome = PluginOutcome::discovered(candidate.declared_id());

        let descriptor = match validate(candidate) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(plugin = ?outcome.id, error = %e, "Skipping invalid plugin");
                return outcome.fail(&e);
            }
        };
        outcome.trail.push(LifecycleStatus::Validated);

        let id = descriptor.id().to_string();
        if let Err(e) = self.registry.register(descriptor) {
            warn!(plugin = %id, error = %e, "Plugin registration refused");
            return outcome.fail(&e);
        }

        if let Err(e) = self.settle(&id).await {
            outcome.error = Some(e.to_string());
        }
        if let Some(entry) = self.registry.get(&id) {
            outcome
                .trail
                .extend(entry.history().iter().map(|change| change.status));
            if outcome.error.is_none() {
                outcome.error = entry.failure().map(str::to_string);
            }
        }
        outcome
    }

    /// Turn a plugin on, running its install hook if still pending.
    pub async fn enable(&mut self, id: &str) -> Result<LifecycleStatus> {
        self.registry.enable(id)?;
        self.settle(id).await
    }

    /// Turn a plugin off.
    pub fn disable(&mut self, id: &str) -> Result<()> {
        self.registry.disable(id)
    }

    /// Merge a partial configuration; runs a newly pending install.
    pub async fn update_config(&mut self, id: &str, patch: ConfigPatch) -> Result<LifecycleStatus> {
        self.registry.update_config(id, patch)?;
        self.settle(id).await
    }

    /// Remove a plugin.
    pub fn unregister(&mut self, id: &str) -> Result<()> {
        self.registry.unregister(id)
    }

    /// Run the install hook of a `Failed` plugin again.
    pub async fn retry_install(&mut self, id: &str) -> Result<LifecycleStatus> {
        let status = self
            .registry
            .get(id)
            .map(|entry| entry.status())
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if status != LifecycleStatus::Failed {
            return Ok(status);
        }
        self.install(id).await
    }

    /// Discard every registered plugin, newest first.
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        let ids: Vec<String> = self
            .registry
            .list()
            .iter()
            .rev()
            .map(|entry| entry.id().to_string())
            .collect();
        for id in &ids {
            if let Err(e) = self.registry.unregister(id) {
                warn!(plugin = %id, error = %e, "Failed to unregister plugin on shutdown");
            }
        }
        self.torn_down = true;
        info!(count = ids.len(), "Plugin host shut down");
    }

    async fn settle(&mut self, id: &str) -> Result<LifecycleStatus> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let runnable = entry.effective_config().enabled
            && entry.install_pending()
            && entry.status() == LifecycleStatus::Registered;
        if runnable {
            self.install(id).await
        } else {
            self.registry.activate(id)
        }
    }

    async fn install(&mut self, id: &str) -> Result<LifecycleStatus> {
        let Some(hook) = self.registry.begin_install(id)? else {
            return self.registry.activate(id);
        };
        info!(plugin = %id, "Running install hook");

        let result = AssertUnwindSafe(hook.install(&mut self.context))
            .catch_unwind()
            .await;
        let outcome = match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(format!("install hook panicked: {}", panic_message(payload.as_ref()))),
        };

        match &outcome {
            Ok(()) => {
                self.context.mark_installed(id);
                info!(plugin = %id, "Plugin installed");
            }
            Err(message) => {
                let err = Error::InstallHook {
                    id: id.to_string(),
                    message: message.clone(),
                };
                error!(plugin = %id, error = %err, "Install hook failed");
            }
        }
        self.registry.finish_install(id, outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RouteTable;
    use crate::plugin::descriptor::{Component, HookError, HookResult, InstallHook, RouteContribution};
    use crate::plugin::registry::DuplicatePolicy;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records its id into a shared log after an optional delay.
    struct Recording {
        id: &'static str,
        delay_ms: u64,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl InstallHook for Recording {
        async fn install(&self, ctx: &mut AppContext) -> HookResult {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.log.lock().unwrap().push(self.id.to_string());
            ctx.set_setting(&format!("{}.installed", self.id), json!(true));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl InstallHook for Failing {
        async fn install(&self, _ctx: &mut AppContext) -> HookResult {
            Err(HookError::new("quote service unreachable"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl InstallHook for Panicking {
        async fn install(&self, _ctx: &mut AppContext) -> HookResult {
            panic!("hook exploded");
        }
    }

    /// Fails on the first run only.
    struct Flaky {
        attempts: Mutex<u32>,
    }

    #[async_trait]
    impl InstallHook for Flaky {
        async fn install(&self, _ctx: &mut AppContext) -> HookResult {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            if *attempts == 1 {
                return Err("first attempt".into());
            }
            Ok(())
        }
    }

    fn candidate(id: &str, config: Value) -> PluginCandidate {
        PluginCandidate::from_manifest(json!({
            "meta": { "id": id, "name": id, "version": "1.0.0" },
            "config": config,
        }))
        .unwrap()
        .with_renderable(Component::shared(id))
        .with_route(RouteContribution::new(&format!("/{}", id), id, id))
    }

    fn driver() -> LifecycleDriver {
        LifecycleDriver::new(PluginRegistry::new(), AppContext::default())
    }

    fn enabled_ids(driver: &LifecycleDriver) -> Vec<&str> {
        driver
            .registry()
            .list_enabled()
            .into_iter()
            .map(|entry| entry.id())
            .collect()
    }

    async fn admit_all(driver: &mut LifecycleDriver, candidates: Vec<PluginCandidate>) {
        for candidate in candidates {
            driver.admit(candidate).await;
        }
    }

    #[tokio::test]
    async fn test_startup_scenario() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = driver();

        admit_all(
            &mut driver,
            vec![
                candidate("finance", json!({ "enabled": true, "autoLoad": true })).with_install(
                    Arc::new(Recording { id: "finance", delay_ms: 0, log: log.clone() }),
                ),
                candidate("info", json!({ "enabled": true, "autoLoad": false })),
                candidate("log-analyzer", json!({ "enabled": false })),
            ],
        )
        .await;

        assert_eq!(enabled_ids(&driver), vec!["finance", "info"]);

        let registry = driver.registry();
        assert!(registry.get("finance").unwrap().passed_through(LifecycleStatus::Installing));
        assert!(!registry.get("info").unwrap().passed_through(LifecycleStatus::Installing));
        assert_eq!(registry.get("log-analyzer").unwrap().status(), LifecycleStatus::Disabled);
        assert_eq!(*log.lock().unwrap(), vec!["finance".to_string()]);
        assert_eq!(driver.context().installed(), ["finance".to_string()]);
    }

    #[tokio::test]
    async fn test_outcome_trail() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = driver();

        let outcome = driver
            .admit(
                candidate("finance", json!({ "autoLoad": true }))
                    .with_install(Arc::new(Recording { id: "finance", delay_ms: 0, log })),
            )
            .await;

        assert_eq!(
            outcome.trail,
            vec![
                LifecycleStatus::Discovered,
                LifecycleStatus::Validated,
                LifecycleStatus::Registered,
                LifecycleStatus::Installing,
                LifecycleStatus::Active,
            ]
        );
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_install_hooks_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = driver();

        let slow = candidate("slow", json!({ "autoLoad": true }))
            .with_install(Arc::new(Recording { id: "slow", delay_ms: 30, log: log.clone() }));
        let fast = candidate("fast", json!({ "autoLoad": true }))
            .with_install(Arc::new(Recording { id: "fast", delay_ms: 0, log: log.clone() }));
        admit_all(&mut driver, vec![slow, fast]).await;

        assert_eq!(*log.lock().unwrap(), vec!["slow".to_string(), "fast".to_string()]);
        assert_eq!(enabled_ids(&driver), vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_failing_hook_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = driver();

        admit_all(
            &mut driver,
            vec![
                candidate("finance", json!({ "autoLoad": true })).with_install(Arc::new(Failing)),
                candidate("info", json!({ "autoLoad": true }))
                    .with_install(Arc::new(Recording { id: "info", delay_ms: 0, log: log.clone() })),
            ],
        )
        .await;

        let finance = driver.registry().get("finance").unwrap();
        assert_eq!(finance.status(), LifecycleStatus::Failed);
        assert_eq!(finance.failure(), Some("quote service unreachable"));
        assert_eq!(enabled_ids(&driver), vec!["info"]);
        assert_eq!(*log.lock().unwrap(), vec!["info".to_string()]);
    }

    #[tokio::test]
    async fn test_panicking_hook_is_isolated() {
        let mut driver = driver();

        let outcome = driver
            .admit(candidate("finance", json!({ "autoLoad": true })).with_install(Arc::new(Panicking)))
            .await;
        driver.admit(candidate("info", json!({}))).await;

        assert_eq!(outcome.status(), LifecycleStatus::Failed);
        assert!(outcome.error.unwrap().contains("hook exploded"));
        assert_eq!(enabled_ids(&driver), vec!["info"]);
    }

    #[tokio::test]
    async fn test_invalid_candidate_skipped() {
        let mut driver = driver();

        let mut nameless = candidate("broken", json!({}));
        nameless.meta.name = None;
        let outcome = driver.admit(nameless).await;
        driver.admit(candidate("info", json!({}))).await;

        assert_eq!(
            outcome.trail,
            vec![LifecycleStatus::Discovered, LifecycleStatus::Failed]
        );
        assert!(outcome.error.unwrap().contains("meta.name"));
        assert!(!driver.registry().contains("broken"));
        assert_eq!(enabled_ids(&driver), vec!["info"]);
    }

    #[tokio::test]
    async fn test_rejected_duplicate_reported() {
        let mut driver = LifecycleDriver::new(
            PluginRegistry::new().with_policy(DuplicatePolicy::Reject),
            AppContext::default(),
        );

        driver.admit(candidate("info", json!({}))).await;
        let outcome = driver.admit(candidate("info", json!({ "enabled": false }))).await;

        assert_eq!(outcome.status(), LifecycleStatus::Failed);
        assert_eq!(enabled_ids(&driver), vec!["info"]);
    }

    #[tokio::test]
    async fn test_enable_runs_deferred_install() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = driver();

        driver
            .admit(
                candidate("finance", json!({ "enabled": false, "autoLoad": true }))
                    .with_install(Arc::new(Recording { id: "finance", delay_ms: 0, log: log.clone() })),
            )
            .await;
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(driver.registry().get("finance").unwrap().status(), LifecycleStatus::Disabled);

        let status = driver.enable("finance").await.unwrap();
        assert_eq!(status, LifecycleStatus::Active);
        assert_eq!(*log.lock().unwrap(), vec!["finance".to_string()]);

        // Installed once; toggling again does not reinstall.
        driver.disable("finance").unwrap();
        driver.enable("finance").await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_config_runs_newly_pending_install() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut driver = driver();

        driver
            .admit(
                candidate("finance", json!({}))
                    .with_install(Arc::new(Recording { id: "finance", delay_ms: 0, log: log.clone() })),
            )
            .await;
        assert!(log.lock().unwrap().is_empty());

        let status = driver
            .update_config("finance", ConfigPatch::auto_load(true))
            .await
            .unwrap();
        assert_eq!(status, LifecycleStatus::Active);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_install() {
        let mut driver = driver();
        driver
            .admit(
                candidate("finance", json!({ "autoLoad": true }))
                    .with_install(Arc::new(Flaky { attempts: Mutex::new(0) })),
            )
            .await;
        assert_eq!(driver.registry().get("finance").unwrap().status(), LifecycleStatus::Failed);

        let status = driver.retry_install("finance").await.unwrap();
        assert_eq!(status, LifecycleStatus::Active);
        assert!(driver.registry().get("finance").unwrap().failure().is_none());

        // Retrying an active plugin is a no-op.
        assert_eq!(driver.retry_install("finance").await.unwrap(), LifecycleStatus::Active);
        assert!(driver.retry_install("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_routes_follow_driver() {
        let mut driver = driver();
        let mut rx = driver.registry_mut().subscribe();
        let mut table = RouteTable::new();

        admit_all(
            &mut driver,
            vec![candidate("finance", json!({})), candidate("info", json!({}))],
        )
        .await;
        table.drain(&mut rx);
        let paths: Vec<&str> = table.routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/finance", "/info"]);

        driver.shutdown();
        table.drain(&mut rx);
        assert!(table.routes().is_empty());
        assert!(driver.registry().is_empty());
        assert!(driver.is_torn_down());
    }

    #[test]
    fn test_start_with_catalog() {
        fn info() -> PluginCandidate {
            candidate("info", json!({}))
        }
        fn broken() -> PluginCandidate {
            PluginCandidate::default()
        }

        let catalog = PluginCatalog::new()
            .with_module("broken", broken)
            .with_module("info", info);
        let mut driver = driver();
        let report = tokio_test::block_on(driver.start(&catalog));

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.active(), vec!["info"]);
        assert_eq!(report.failed().len(), 1);
        assert!(report.get("info").is_some());
    }

    #[test]
    fn test_from_config() {
        let config = HostConfig::default()
            .with_policy(DuplicatePolicy::Reject)
            .with_plugin_override("info", ConfigPatch::enabled(false));
        let mut driver = LifecycleDriver::from_config(&config).unwrap();
        assert_eq!(driver.registry().policy(), DuplicatePolicy::Reject);

        tokio_test::block_on(driver.admit(candidate("info", json!({}))));
        assert_eq!(driver.registry().get("info").unwrap().status(), LifecycleStatus::Disabled);
    }
}
