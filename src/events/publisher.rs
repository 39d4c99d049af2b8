//! Lifecycle event publisher
//!
//! Listeners are awaited one after another in registration order, inside the
//! manager's `start()`. A listener error aborts the publication and fails the
//! start. Passive observers can subscribe to a broadcast channel instead; it
//! only sees events every listener accepted.

use super::event::LifecycleEvent;
use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Broadcast buffer per subscriber; a start publishes at most three events
const BROADCAST_CAPACITY: usize = 16;

/// Reacts to lifecycle milestones
#[async_trait]
pub trait LifecycleListener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn on_lifecycle_event(&self, event: &LifecycleEvent) -> Result<(), GatewayError>;
}

/// Fans lifecycle events out to registered listeners
pub struct EventPublisher {
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
    sender: broadcast::Sender<LifecycleEvent>,
    metrics: Arc<GatewayMetrics>,
}

impl EventPublisher {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            listeners: RwLock::new(Vec::new()),
            sender,
            metrics,
        }
    }

    pub fn register(&self, listener: Arc<dyn LifecycleListener>) {
        debug!(listener = listener.name(), "Lifecycle listener registered");
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Receive every published event without taking part in startup
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Deliver `event` to every listener, stopping at the first failure
    pub async fn publish(&self, event: LifecycleEvent) -> Result<(), GatewayError> {
        let listeners = self.listeners.read().clone();

        debug!(
            event_id = %event.id,
            kind = %event.kind,
            mode = %event.mode,
            listeners = listeners.len(),
            "Publishing lifecycle event"
        );

        for listener in &listeners {
            if let Err(e) = listener.on_lifecycle_event(&event).await {
                warn!(
                    listener = listener.name(),
                    kind = %event.kind,
                    error = %e,
                    "Lifecycle listener failed"
                );
                return Err(e);
            }
        }

        self.metrics.record_milestone(event.kind.as_str());
        // No receivers is not an error
        let _ = self.sender.send(event);
        Ok(())
    }
}
