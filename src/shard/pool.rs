//! Shard pool implementation
//!
//! Manages the full set of Discord shards of one bot in this process.

use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;
use crate::shard::listener::{GatewayListener, ListenerSet};
use crate::shard::session::{Session, TwilightSession, SHUTDOWN_GRACE};
use crate::shard::state::ShardState;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};
use twilight_gateway::{Config, Intents, Shard};
use twilight_model::gateway::ShardId;

/// A coordinated set of sessions
#[async_trait]
pub trait ShardCluster: Send + Sync {
    /// Create and connect every configured shard
    async fn login(&self) -> Result<(), GatewayError>;

    /// Close every shard and connect a fresh set
    async fn restart(&self) -> Result<(), GatewayError>;

    /// Close every shard
    async fn shutdown(&self);

    fn shards_total(&self) -> u32;

    /// Shards that exist and are not shutting down
    fn shards_running(&self) -> u32;

    /// Shards waiting for a (re)connect
    fn shards_queued(&self) -> u32;

    /// Current sessions, ordered by shard index
    fn shards(&self) -> Vec<Arc<dyn Session>>;

    fn shard(&self, shard_id: u32) -> Option<Arc<dyn Session>> {
        self.shards()
            .into_iter()
            .find(|s| s.shard().number == shard_id)
    }

    fn add_shard_listener(&self, shard_id: u32, listener: Arc<dyn GatewayListener>);

    fn remove_shard_listener(&self, shard_id: u32, listener: &Arc<dyn GatewayListener>) -> bool;
}

/// Shard pool managing every Discord shard of the bot
pub struct ShardPool {
    token: String,
    intents: Intents,
    total_shards: u32,
    sessions: RwLock<Vec<Arc<TwilightSession>>>,
    state: ShardState,
    listeners: ListenerSet,
    metrics: Arc<GatewayMetrics>,
}

impl ShardPool {
    /// Create a new shard pool
    ///
    /// # Arguments
    /// * `total_shards` - Number of shards to run
    /// * `token` - Discord bot token
    /// * `intents` - Discord gateway intents
    /// * `listeners` - Gateway listeners shared by every shard
    /// * `metrics` - Prometheus metrics
    pub fn new(
        total_shards: u64,
        token: String,
        intents: Intents,
        listeners: ListenerSet,
        metrics: Arc<GatewayMetrics>,
    ) -> Result<Self, GatewayError> {
        // Safe u64 → u32 cast at Twilight API boundary
        let total_shards = u32::try_from(total_shards)
            .map_err(|_| GatewayError::ShardIdOverflow { value: total_shards })?;

        if total_shards == 0 {
            return Err(GatewayError::Config(
                "total shard count must be at least 1".to_string(),
            ));
        }

        info!(total_shards, "Creating shard pool");

        Ok(Self {
            token,
            intents,
            total_shards,
            sessions: RwLock::new(Vec::new()),
            state: ShardState::new(0..total_shards),
            listeners,
            metrics,
        })
    }

    /// Get shared state (for health checks)
    pub fn state(&self) -> ShardState {
        self.state.clone()
    }

    fn create_shards(&self) -> Vec<Shard> {
        (0..self.total_shards)
            .map(|shard_id| {
                let config = Config::new(self.token.clone(), self.intents);
                Shard::with_config(ShardId::new(shard_id, self.total_shards), config)
            })
            .collect()
    }
}

#[async_trait]
impl ShardCluster for ShardPool {
    async fn login(&self) -> Result<(), GatewayError> {
        if self.shards_running() > 0 {
            warn!("Shards already running, login ignored");
            return Ok(());
        }

        let sessions: Vec<_> = self
            .create_shards()
            .into_iter()
            .map(|shard| {
                self.state.reset(shard.id().number());
                TwilightSession::spawn(
                    shard,
                    self.state.clone(),
                    self.listeners.clone(),
                    Arc::clone(&self.metrics),
                )
            })
            .collect();

        info!(shard_count = sessions.len(), "Shards spawned");
        *self.sessions.write() = sessions;
        Ok(())
    }

    async fn restart(&self) -> Result<(), GatewayError> {
        self.shutdown().await;
        self.login().await
    }

    async fn shutdown(&self) {
        let sessions = std::mem::take(&mut *self.sessions.write());
        if sessions.is_empty() {
            return;
        }

        for session in &sessions {
            session.shutdown();
        }

        // One grace period for the whole pool, not per shard
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        for session in &sessions {
            if tokio::time::timeout_at(deadline, session.await_shutdown())
                .await
                .is_err()
            {
                warn!(
                    shard = %session.shard(),
                    "Shard did not close within grace period, cancelling"
                );
                session.shutdown_now();
                session.await_shutdown().await;
            }
        }

        info!(shard_count = sessions.len(), "Shard pool shut down");
    }

    fn shards_total(&self) -> u32 {
        self.total_shards
    }

    fn shards_running(&self) -> u32 {
        if self.sessions.read().is_empty() {
            return 0;
        }
        self.state.running_shards() as u32
    }

    fn shards_queued(&self) -> u32 {
        self.state.queued_shards() as u32
    }

    fn shards(&self) -> Vec<Arc<dyn Session>> {
        self.sessions
            .read()
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn Session>)
            .collect()
    }

    fn add_shard_listener(&self, shard_id: u32, listener: Arc<dyn GatewayListener>) {
        self.listeners.add_for_shard(shard_id, listener);
    }

    fn remove_shard_listener(&self, shard_id: u32, listener: &Arc<dyn GatewayListener>) -> bool {
        self.listeners.remove_for_shard(shard_id, listener)
    }
}
