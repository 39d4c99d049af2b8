//! Lifecycle milestones published by the gateway managers

use crate::lifecycle::{Gateway, GatewayMode};

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Milestone reached during `start()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// Connection(s) exist and report running; caches may still be filling
    SemiReady,
    /// Every configured shard has been created (shard mode only)
    AllShardsCreated,
    /// Every connection finished its handshake
    Ready,
}

impl LifecycleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SemiReady => "semi_ready",
            Self::AllShardsCreated => "all_shards_created",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle milestone together with the manager that reached it
#[derive(Clone)]
pub struct LifecycleEvent {
    pub id: Uuid,
    pub kind: LifecycleEventKind,
    pub mode: GatewayMode,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    source: Arc<dyn Gateway>,
}

impl LifecycleEvent {
    pub fn new(kind: LifecycleEventKind, source: Arc<dyn Gateway>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            kind,
            mode: source.mode(),
            timestamp,
            source,
        }
    }

    /// The manager that published this event
    pub fn source(&self) -> &Arc<dyn Gateway> {
        &self.source
    }
}

impl fmt::Debug for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEvent")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}
