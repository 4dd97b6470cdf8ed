//! Registry events.
//!
//! Notifications the host consumes to keep its navigation tree in sync.

use crate::plugin::descriptor::RouteContribution;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Event emitted by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// Plugin registered (or replaced)
    Registered { id: String, seq: u64 },
    /// Plugin became visible; its routes should be mounted
    Activated {
        id: String,
        seq: u64,
        routes: Vec<RouteContribution>,
    },
    /// Plugin left the visible set; its routes should be retracted
    Deactivated { id: String },
    /// Install hook failed
    Failed { id: String, reason: String },
    /// Effective configuration changed
    ConfigUpdated { id: String },
    /// Plugin removed; its routes should be retracted
    Unregistered { id: String },
}

impl RegistryEvent {
    /// Plugin the event refers to.
    pub fn plugin_id(&self) -> &str {
        match self {
            RegistryEvent::Registered { id, .. }
            | RegistryEvent::Activated { id, .. }
            | RegistryEvent::Deactivated { id }
            | RegistryEvent::Failed { id, .. }
            | RegistryEvent::ConfigUpdated { id }
            | RegistryEvent::Unregistered { id } => id,
        }
    }
}

/// Fan-out of registry events to subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<mpsc::UnboundedSender<RegistryEvent>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver an event; dropped receivers are pruned.
    pub fn publish(&mut self, event: RegistryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_to_all_subscribers() {
        let mut bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(RegistryEvent::ConfigUpdated { id: "info".into() });

        assert_eq!(a.try_recv().unwrap().plugin_id(), "info");
        assert_eq!(b.try_recv().unwrap().plugin_id(), "info");
    }

    #[test]
    fn test_dropped_subscribers_pruned() {
        let mut bus = EventBus::new();
        let rx = bus.subscribe();
        let _keep = bus.subscribe();
        drop(rx);

        bus.publish(RegistryEvent::Unregistered { id: "finance".into() });
        assert_eq!(bus.subscriber_count(), 1);
    }
}
