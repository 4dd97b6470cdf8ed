//! Navigation tree kept in sync with registry events.

use crate::plugin::descriptor::RouteContribution;
use crate::plugin::events::RegistryEvent;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Routes mounted by the host, grouped by contributing plugin.
#[derive(Debug, Default)]
pub struct RouteTable {
    /// Registration sequence -> (plugin id, routes)
    mounted: BTreeMap<u64, (String, Vec<RouteContribution>)>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one registry event.
    pub fn apply(&mut self, event: &RegistryEvent) {
        match event {
            RegistryEvent::Activated { id, seq, routes } => {
                // A replaced descriptor may reuse its slot.
                self.retract(id);
                if !routes.is_empty() {
                    self.mounted.insert(*seq, (id.clone(), routes.clone()));
                }
            }
            RegistryEvent::Deactivated { id } | RegistryEvent::Unregistered { id } => {
                self.retract(id);
            }
            _ => {}
        }
    }

    /// Apply every event currently queued on a receiver.
    pub fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<RegistryEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply(&event);
            applied += 1;
        }
        applied
    }

    /// Mounted routes in plugin registration order.
    pub fn routes(&self) -> Vec<&RouteContribution> {
        self.mounted
            .values()
            .flat_map(|(_, routes)| routes.iter())
            .collect()
    }

    /// Whether a plugin currently contributes routes.
    pub fn contributes(&self, id: &str) -> bool {
        self.mounted.values().any(|(owner, _)| owner == id)
    }

    fn retract(&mut self, id: &str) {
        self.mounted.retain(|_, (owner, _)| owner != id);
    }
}
