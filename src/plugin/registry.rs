//! Plugin registry for managing plugins.
//!
//! Owns the `id -> entry` mapping: registration, effective configuration,
//! activation state and the event stream the host follows.

use crate::core::{now, Error, Result, Timestamp};
use crate::plugin::descriptor::{InstallHook, PluginConfig, PluginDescriptor, RouteContribution};
use crate::plugin::events::{EventBus, RegistryEvent};
use crate::plugin::merge::{merge, ConfigPatch};
use crate::plugin::store::{MemoryOverrideStore, OverrideStore};
use crate::plugin::validation::check_descriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Plugin lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleStatus {
    /// Exported by a module, not yet checked
    Discovered,
    /// Passed validation
    Validated,
    /// Stored in the registry
    Registered,
    /// Install hook running
    Installing,
    /// Visible to the host
    Active,
    /// Validation or install failed
    Failed,
    /// Turned off by the host
    Disabled,
    /// Removed from the registry
    Unregistered,
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleStatus::Discovered => "discovered",
            LifecycleStatus::Validated => "validated",
            LifecycleStatus::Registered => "registered",
            LifecycleStatus::Installing => "installing",
            LifecycleStatus::Active => "active",
            LifecycleStatus::Failed => "failed",
            LifecycleStatus::Disabled => "disabled",
            LifecycleStatus::Unregistered => "unregistered",
        };
        write!(f, "{}", name)
    }
}

/// What to do when an id is registered twice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Last write wins; the entry keeps its position
    #[default]
    Replace,
    /// Fail with `DuplicateId`
    Reject,
}

/// A status an entry passed through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub status: LifecycleStatus,
    pub at: Timestamp,
}

/// Registered plugin entry.
pub struct RegistryEntry {
    descriptor: PluginDescriptor,
    effective_config: PluginConfig,
    status: LifecycleStatus,
    overrides: ConfigPatch,
    registered_at: Timestamp,
    seq: u64,
    installed: bool,
    failure: Option<String>,
    history: Vec<StatusChange>,
}

impl RegistryEntry {
    fn new(
        descriptor: PluginDescriptor,
        layered: &ConfigPatch,
        overrides: ConfigPatch,
        seq: u64,
    ) -> Self {
        let effective_config = merge(&descriptor.config, Some(layered));
        let registered_at = now();
        Self {
            descriptor,
            effective_config,
            status: LifecycleStatus::Registered,
            overrides,
            registered_at,
            seq,
            installed: false,
            failure: None,
            history: vec![StatusChange {
                status: LifecycleStatus::Registered,
                at: registered_at,
            }],
        }
    }

    /// Plugin id.
    pub fn id(&self) -> &str {
        self.descriptor.id()
    }

    /// The registered descriptor.
    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// Defaults merged with overrides and updates.
    pub fn effective_config(&self) -> &PluginConfig {
        &self.effective_config
    }

    /// Current lifecycle status.
    pub fn status(&self) -> LifecycleStatus {
        self.status
    }

    /// Accumulated user overrides, excluding host-supplied ones.
    pub fn overrides(&self) -> &ConfigPatch {
        &self.overrides
    }

    /// Registration time.
    pub fn registered_at(&self) -> Timestamp {
        self.registered_at
    }

    /// Registration sequence number (route ordering key).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether the install hook completed.
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Last install failure.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Every status this entry passed through, oldest first.
    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// Whether the entry ever reached `status`.
    pub fn passed_through(&self, status: LifecycleStatus) -> bool {
        self.history.iter().any(|change| change.status == status)
    }

    /// Whether the host should render this plugin.
    pub fn is_listed(&self) -> bool {
        self.effective_config.enabled && self.status == LifecycleStatus::Active
    }

    /// Install hook that has yet to run for the current configuration.
    pub fn install_pending(&self) -> bool {
        self.descriptor.wants_install(&self.effective_config) && !self.installed
    }

    fn transition(&mut self, status: LifecycleStatus) {
        if self.status != status {
            debug!(plugin = %self.id(), from = %self.status, to = %status, "Plugin status changed");
            self.status = status;
            self.history.push(StatusChange { status, at: now() });
        }
    }

    /// Status after the `enabled` flag settles.
    fn settled_status(&self) -> LifecycleStatus {
        match self.status {
            LifecycleStatus::Failed | LifecycleStatus::Installing => self.status,
            _ if !self.effective_config.enabled => LifecycleStatus::Disabled,
            _ if self.install_pending() => LifecycleStatus::Registered,
            _ => LifecycleStatus::Active,
        }
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("id", &self.id())
            .field("effective_config", &self.effective_config)
            .field("status", &self.status)
            .field("seq", &self.seq)
            .field("installed", &self.installed)
            .field("failure", &self.failure)
            .finish()
    }
}

/// Plugin registry.
pub struct PluginRegistry {
    /// Registered plugins
    entries: HashMap<String, RegistryEntry>,
    /// Registration order
    order: Vec<String>,
    /// Next registration sequence number
    next_seq: u64,
    /// Duplicate-id policy
    policy: DuplicatePolicy,
    /// Override persistence
    store: Arc<dyn OverrideStore>,
    /// Event subscribers
    events: EventBus,
}

impl PluginRegistry {
    /// Create a registry with in-memory overrides and last-write-wins.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryOverrideStore::new()))
    }

    /// Create a registry backed by the given override store.
    pub fn with_store(store: Arc<dyn OverrideStore>) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            next_seq: 0,
            policy: DuplicatePolicy::default(),
            store,
            events: EventBus::new(),
        }
    }

    /// Set the duplicate-id policy.
    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current duplicate-id policy.
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Subscribe to registry events.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Register a plugin.
    pub fn register(&mut self, descriptor: PluginDescriptor) -> Result<()> {
        check_descriptor(&descriptor)?;
        let id = descriptor.id().to_string();

        let seq = match self.entries.get(&id) {
            Some(existing) => {
                if self.policy == DuplicatePolicy::Reject {
                    return Err(Error::DuplicateId(id));
                }
                warn!(plugin = %id, "Plugin id registered twice, replacing previous descriptor");
                if existing.is_listed() {
                    self.events.publish(RegistryEvent::Deactivated { id: id.clone() });
                }
                existing.seq
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.order.push(id.clone());
                seq
            }
        };

        let (layered, overrides) = self.load_overrides(&id);
        let entry = RegistryEntry::new(descriptor, &layered, overrides, seq);
        info!(
            plugin = %id,
            name = %entry.descriptor.meta.name,
            version = %entry.descriptor.meta.version,
            "Plugin registered"
        );
        self.entries.insert(id.clone(), entry);
        self.events.publish(RegistryEvent::Registered { id, seq });
        Ok(())
    }

    /// Unregister a plugin.
    pub fn unregister(&mut self, id: &str) -> Result<()> {
        if self.entries.remove(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        self.order.retain(|existing| existing != id);
        info!(plugin = %id, "Plugin unregistered");
        self.events.publish(RegistryEvent::Unregistered { id: id.to_string() });
        Ok(())
    }

    /// Turn a plugin on.
    pub fn enable(&mut self, id: &str) -> Result<()> {
        self.set_enabled(id, true)
    }

    /// Turn a plugin off.
    pub fn disable(&mut self, id: &str) -> Result<()> {
        self.set_enabled(id, false)
    }

    /// Merge a partial configuration into the plugin's effective configuration.
    pub fn update_config(&mut self, id: &str, patch: ConfigPatch) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if patch.is_empty() {
            return Ok(());
        }

        let was_listed = entry.is_listed();
        entry.effective_config = merge(&entry.effective_config, Some(&patch));
        entry.overrides = entry.overrides.combine(&patch);
        let status = entry.settled_status();
        entry.transition(status);
        let overrides = entry.overrides.clone();

        info!(plugin = %id, "Plugin configuration updated");
        self.save_overrides(id, &overrides);
        self.events.publish(RegistryEvent::ConfigUpdated { id: id.to_string() });
        self.publish_visibility(id, was_listed);
        Ok(())
    }

    /// Get a plugin entry by id.
    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    /// Whether an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All entries in registration order.
    pub fn list(&self) -> Vec<&RegistryEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    /// Entries the host should render, in registration order.
    pub fn list_enabled(&self) -> Vec<&RegistryEntry> {
        self.list()
            .into_iter()
            .filter(|entry| entry.is_listed())
            .collect()
    }

    /// Route contributions of listed plugins, in registration order.
    pub fn active_routes(&self) -> Vec<&RouteContribution> {
        self.list_enabled()
            .into_iter()
            .flat_map(|entry| entry.descriptor.routes.iter())
            .collect()
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Lifecycle transitions driven by the lifecycle driver.

    /// Settle a freshly registered entry that needs no install.
    pub(crate) fn activate(&mut self, id: &str) -> Result<LifecycleStatus> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let was_listed = entry.is_listed();
        let status = entry.settled_status();
        entry.transition(status);
        self.publish_visibility(id, was_listed);
        Ok(status)
    }

    /// Move an entry to `Installing` and hand out its hook.
    pub(crate) fn begin_install(&mut self, id: &str) -> Result<Option<Arc<dyn InstallHook>>> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let Some(hook) = entry.descriptor.install.clone() else {
            return Ok(None);
        };
        entry.failure = None;
        entry.transition(LifecycleStatus::Installing);
        Ok(Some(hook))
    }

    /// Record a finished install hook.
    pub(crate) fn finish_install(
        &mut self,
        id: &str,
        outcome: std::result::Result<(), String>,
    ) -> Result<LifecycleStatus> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let was_listed = entry.is_listed();

        match outcome {
            Ok(()) => {
                entry.installed = true;
                entry.status = LifecycleStatus::Registered;
                let status = entry.settled_status();
                entry.transition(status);
                self.publish_visibility(id, was_listed);
                Ok(status)
            }
            Err(reason) => {
                entry.failure = Some(reason.clone());
                entry.transition(LifecycleStatus::Failed);
                self.events.publish(RegistryEvent::Failed {
                    id: id.to_string(),
                    reason,
                });
                self.publish_visibility(id, was_listed);
                Ok(LifecycleStatus::Failed)
            }
        }
    }

    fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let was_listed = entry.is_listed();
        let flag_changed = entry.effective_config.enabled != enabled;
        entry.effective_config.enabled = enabled;
        let status = entry.settled_status();
        if !flag_changed && status == entry.status {
            return Ok(());
        }
        entry.transition(status);

        if flag_changed {
            entry.overrides = entry.overrides.combine(&ConfigPatch::enabled(enabled));
            let overrides = entry.overrides.clone();
            self.save_overrides(id, &overrides);
        }

        info!(plugin = %id, enabled, status = %status, "Plugin toggled");
        self.publish_visibility(id, was_listed);
        Ok(())
    }

    fn publish_visibility(&mut self, id: &str, was_listed: bool) {
        let Some(entry) = self.entries.get(id) else {
            return;
        };
        match (was_listed, entry.is_listed()) {
            (false, true) => self.events.publish(RegistryEvent::Activated {
                id: id.to_string(),
                seq: entry.seq,
                routes: entry.descriptor.routes.clone(),
            }),
            (true, false) => self
                .events
                .publish(RegistryEvent::Deactivated { id: id.to_string() }),
            _ => {}
        }
    }

    /// Overrides in effect, and the saved layer later changes fold into.
    fn load_overrides(&self, id: &str) -> (ConfigPatch, ConfigPatch) {
        let loaded = self.store.load_overrides(id).and_then(|layered| {
            let saved = self.store.load_saved_overrides(id)?;
            Ok((layered.unwrap_or_default(), saved.unwrap_or_default()))
        });
        loaded.unwrap_or_else(|e| {
            warn!(plugin = %id, error = %e, "Failed to load overrides, using defaults");
            (ConfigPatch::default(), ConfigPatch::default())
        })
    }

    fn save_overrides(&self, id: &str, overrides: &ConfigPatch) {
        if let Err(e) = self.store.save_overrides(id, overrides) {
            warn!(plugin = %id, error = %e, "Failed to persist overrides");
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("order", &self.order)
            .field("policy", &self.policy)
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}

/// Registry shared across tasks behind a single-writer lock.
#[derive(Clone)]
pub struct SharedPluginRegistry {
    inner: Arc<RwLock<PluginRegistry>>,
}

impl SharedPluginRegistry {
    /// Wrap a registry.
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Access the inner lock.
    pub fn inner(&self) -> &Arc<RwLock<PluginRegistry>> {
        &self.inner
    }

    /// Ids of listed plugins, in registration order.
    pub async fn enabled_ids(&self) -> Vec<String> {
        let registry = self.inner.read().await;
        registry
            .list_enabled()
            .into_iter()
            .map(|entry| entry.id().to_string())
            .collect()
    }

    /// Status of a plugin.
    pub async fn status(&self, id: &str) -> Option<LifecycleStatus> {
        let registry = self.inner.read().await;
        registry.get(id).map(|entry| entry.status())
    }

    /// Turn a plugin on.
    pub async fn enable(&self, id: &str) -> Result<()> {
        self.inner.write().await.enable(id)
    }

    /// Turn a plugin off.
    pub async fn disable(&self, id: &str) -> Result<()> {
        self.inner.write().await.disable(id)
    }

    /// Merge a partial configuration.
    pub async fn update_config(&self, id: &str, patch: ConfigPatch) -> Result<()> {
        self.inner.write().await.update_config(id, patch)
    }
}
