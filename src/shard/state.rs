//! Shard state tracking
//!
//! Tracks status, latency and counters of individual sessions. Status changes
//! are published on a per-shard watch channel so readiness and shutdown can be
//! awaited instead of polled.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Status of one gateway session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Session object exists but its connection task has not started
    Initializing,
    /// Connecting and identifying
    Connecting,
    /// Handshake finished, receiving events
    Ready,
    /// Resuming after disconnect
    Resuming,
    /// Disconnected, queued for reconnect
    Disconnected,
    /// Graceful close requested
    ShuttingDown,
    /// Connection task finished
    Shutdown,
    /// Fatal error, will not reconnect
    Dead,
}

impl SessionStatus {
    /// Returns true if the session is alive (created and not shutting down)
    pub fn is_running(&self) -> bool {
        !matches!(
            self,
            SessionStatus::Initializing
                | SessionStatus::ShuttingDown
                | SessionStatus::Shutdown
                | SessionStatus::Dead
        )
    }

    /// Returns true if the session finished its handshake
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionStatus::Ready)
    }

    /// Returns true if the session will never run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Shutdown | SessionStatus::Dead)
    }

    /// Returns true if the session is closing or closed
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, SessionStatus::ShuttingDown | SessionStatus::Shutdown)
    }

    /// Returns true if the session waits for a (re)connect slot
    pub fn is_queued(&self) -> bool {
        matches!(self, SessionStatus::Initializing | SessionStatus::Disconnected)
    }
}

/// State for a single shard
#[derive(Debug)]
pub struct ShardStateEntry {
    status: watch::Sender<SessionStatus>,
    guilds: AtomicU64,
    latency_ms: AtomicU64,
}

const LATENCY_UNKNOWN: u64 = u64::MAX;

impl Default for ShardStateEntry {
    fn default() -> Self {
        let (status, _) = watch::channel(SessionStatus::Initializing);
        Self {
            status,
            guilds: AtomicU64::new(0),
            latency_ms: AtomicU64::new(LATENCY_UNKNOWN),
        }
    }
}

/// Shared state across all sessions of one gateway
#[derive(Debug, Clone)]
pub struct ShardState {
    inner: Arc<ShardStateInner>,
}

#[derive(Debug)]
struct ShardStateInner {
    shards: DashMap<u32, ShardStateEntry>,
}

impl ShardState {
    /// Create a new shard state tracker
    pub fn new(shard_ids: impl Iterator<Item = u32>) -> Self {
        let shards = DashMap::new();
        for shard_id in shard_ids {
            shards.insert(shard_id, ShardStateEntry::default());
        }

        Self {
            inner: Arc::new(ShardStateInner { shards }),
        }
    }

    /// Reset a shard to a fresh entry, e.g. before it is recreated on restart
    pub fn reset(&self, shard_id: u32) {
        self.inner.shards.insert(shard_id, ShardStateEntry::default());
    }

    /// Update shard status
    pub fn set_status(&self, shard_id: u32, status: SessionStatus) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.status.send_replace(status);
        }
    }

    /// Update status unless the shard is closing or already closed
    pub fn advance_status(&self, shard_id: u32, status: SessionStatus) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.status.send_if_modified(|current| {
                if current.is_shutting_down() || current.is_terminal() || *current == status {
                    false
                } else {
                    *current = status;
                    true
                }
            });
        }
    }

    /// Get status for a specific shard
    pub fn status(&self, shard_id: u32) -> Option<SessionStatus> {
        self.inner.shards.get(&shard_id).map(|e| *e.status.borrow())
    }

    /// Subscribe to status changes of a shard
    pub fn subscribe(&self, shard_id: u32) -> Option<watch::Receiver<SessionStatus>> {
        self.inner.shards.get(&shard_id).map(|e| e.status.subscribe())
    }

    /// Update shard guild count
    pub fn set_guilds(&self, shard_id: u32, count: u64) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.guilds.store(count, Ordering::Relaxed);
        }
    }

    /// Adjust shard guild count by one
    pub fn adjust_guilds(&self, shard_id: u32, joined: bool) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            if joined {
                entry.guilds.fetch_add(1, Ordering::Relaxed);
            } else {
                let _ = entry
                    .guilds
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |g| g.checked_sub(1));
            }
        }
    }

    /// Record the latency average after a heartbeat acknowledgement
    pub fn record_heartbeat(&self, shard_id: u32, latency: Option<Duration>) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            if let Some(latency) = latency {
                let millis = u64::try_from(latency.as_millis()).unwrap_or(LATENCY_UNKNOWN - 1);
                entry.latency_ms.store(millis, Ordering::Relaxed);
            }
        }
    }

    /// Gateway round-trip latency of a shard, if a heartbeat was acknowledged
    pub fn latency(&self, shard_id: u32) -> Option<Duration> {
        self.inner.shards.get(&shard_id).and_then(|e| {
            match e.latency_ms.load(Ordering::Relaxed) {
                LATENCY_UNKNOWN => None,
                millis => Some(Duration::from_millis(millis)),
            }
        })
    }

    /// Get total guilds across all shards
    pub fn total_guilds(&self) -> u64 {
        self.inner
            .shards
            .iter()
            .map(|e| e.guilds.load(Ordering::Relaxed))
            .sum()
    }

    fn count(&self, predicate: impl Fn(SessionStatus) -> bool) -> usize {
        self.inner
            .shards
            .iter()
            .filter(|e| predicate(*e.status.borrow()))
            .count()
    }

    /// Get count of ready shards
    pub fn ready_shards(&self) -> usize {
        self.count(|s| s.is_ready())
    }

    /// Get count of running shards (created and not shutting down)
    pub fn running_shards(&self) -> usize {
        self.count(|s| s.is_running())
    }

    /// Get count of shards waiting for a (re)connect
    pub fn queued_shards(&self) -> usize {
        self.count(|s| s.is_queued())
    }
}
