//! Multi-shard lifecycle manager

use super::{average_latency, spin_until, Gateway, GatewayMode, Lifecycle, LifecycleState};
use crate::error::GatewayError;
use crate::events::{EventPublisher, LifecycleEvent, LifecycleEventKind};
use crate::metrics::GatewayMetrics;
use crate::shard::{GatewayListener, Session, SessionStatus, ShardCluster, ShardInfo};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

/// Drives a shard set from login to shutdown
///
/// Once stopped the cluster is released and the manager cannot be started
/// again; build a new one instead.
pub struct ShardedManager {
    cluster: RwLock<Option<Arc<dyn ShardCluster>>>,
    publisher: Arc<EventPublisher>,
    metrics: Arc<GatewayMetrics>,
    lifecycle: Mutex<()>,
    state: watch::Sender<LifecycleState>,
    this: Weak<ShardedManager>,
}

impl ShardedManager {
    pub fn new(
        cluster: Arc<dyn ShardCluster>,
        publisher: Arc<EventPublisher>,
        metrics: Arc<GatewayMetrics>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(LifecycleState::Stopped);
        metrics.set_lifecycle_state(GatewayMode::Sharded, LifecycleState::Stopped);

        Arc::new_cyclic(|this| Self {
            cluster: RwLock::new(Some(cluster)),
            publisher,
            metrics,
            lifecycle: Mutex::new(()),
            state,
            this: this.clone(),
        })
    }

    fn cluster(&self) -> Result<Arc<dyn ShardCluster>, GatewayError> {
        self.cluster
            .read()
            .clone()
            .ok_or(GatewayError::AlreadyShutdown)
    }

    /// True once the cluster was released or every shard is closing
    pub fn is_shutting_down(&self) -> bool {
        match self.cluster.read().as_ref() {
            None => true,
            Some(cluster) => cluster
                .shards()
                .iter()
                .all(|shard| shard.status().is_shutting_down()),
        }
    }

    /// Shards waiting for a (re)connect
    pub fn shards_queued(&self) -> u32 {
        self.cluster
            .read()
            .as_ref()
            .map_or(0, |cluster| cluster.shards_queued())
    }

    /// Session of one shard by index
    pub fn shard(&self, shard_id: u32) -> Option<Arc<dyn Session>> {
        self.cluster
            .read()
            .as_ref()
            .and_then(|cluster| cluster.shard(shard_id))
    }

    /// Attach a listener that only receives events of one shard
    pub fn add_shard_listener(
        &self,
        shard_id: u32,
        listener: Arc<dyn GatewayListener>,
    ) -> Result<(), GatewayError> {
        self.cluster()?.add_shard_listener(shard_id, listener);
        Ok(())
    }

    /// Detach a per-shard listener. Returns false if it was not attached.
    pub fn remove_shard_listener(
        &self,
        shard_id: u32,
        listener: &Arc<dyn GatewayListener>,
    ) -> Result<bool, GatewayError> {
        Ok(self.cluster()?.remove_shard_listener(shard_id, listener))
    }

    fn transition(&self, state: LifecycleState) {
        let previous = self.state.send_replace(state);
        self.metrics.set_lifecycle_state(GatewayMode::Sharded, state);
        debug!(from = %previous, to = %state, "Lifecycle transition");
    }

    async fn publish(&self, kind: LifecycleEventKind) -> Result<(), GatewayError> {
        let source: Arc<dyn Gateway> = self.this.upgrade().ok_or(GatewayError::AlreadyShutdown)?;
        self.publisher.publish(LifecycleEvent::new(kind, source)).await
    }

    async fn bring_up(&self, cluster: &Arc<dyn ShardCluster>) -> Result<(), GatewayError> {
        if cluster.shards_running() > 0 {
            info!(running = cluster.shards_running(), "Shards already running, restarting");
            cluster.restart().await?;
        } else {
            cluster.login().await?;
        }

        spin_until(
            || cluster.shards_running() > 0,
            || every_shard_terminated(cluster.as_ref()),
        )
        .await?;

        self.transition(LifecycleState::SemiReady);
        info!(
            running = cluster.shards_running(),
            total = cluster.shards_total(),
            "First shard running"
        );
        self.publish(LifecycleEventKind::SemiReady).await?;

        spin_until(
            || cluster.shards_running() == cluster.shards_total(),
            || any_shard_terminated(cluster.as_ref()),
        )
        .await?;

        info!(total = cluster.shards_total(), "All shards created");
        self.publish(LifecycleEventKind::AllShardsCreated).await?;

        for shard in cluster.shards() {
            let info = shard.shard();
            shard
                .await_ready()
                .await
                .map_err(|e| GatewayError::ShardStartup {
                    shard_id: info.number,
                    source: Box::new(e),
                })?;
            debug!(shard = %info, "Shard ready");
        }

        self.transition(LifecycleState::Ready);
        info!(total = cluster.shards_total(), "All shards ready");
        self.publish(LifecycleEventKind::Ready).await
    }
}

fn terminated(shard: &Arc<dyn Session>) -> GatewayError {
    GatewayError::ShardStartup {
        shard_id: shard.shard().number,
        source: Box::new(GatewayError::SessionTerminated {
            status: shard.status(),
        }),
    }
}

fn every_shard_terminated(cluster: &dyn ShardCluster) -> Option<GatewayError> {
    let shards = cluster.shards();
    if !shards.is_empty() && shards.iter().all(|s| s.status().is_terminal()) {
        return shards.first().map(terminated);
    }
    None
}

fn any_shard_terminated(cluster: &dyn ShardCluster) -> Option<GatewayError> {
    cluster
        .shards()
        .iter()
        .find(|s| s.status().is_terminal())
        .map(terminated)
}

#[async_trait]
impl Lifecycle for ShardedManager {
    async fn start(&self) -> Result<(), GatewayError> {
        let _guard = self.lifecycle.lock().await;
        let cluster = self.cluster()?;

        info!(total = cluster.shards_total(), "Starting shard manager");
        self.transition(LifecycleState::Starting);

        let result = self.bring_up(&cluster).await;
        if let Err(e) = &result {
            error!(error = %e, "Shard manager failed to start");
            self.metrics.record_error(e.error_type_label());
            cluster.shutdown().await;
            self.transition(LifecycleState::Stopped);
        }
        result
    }

    async fn stop(&self) -> Result<(), GatewayError> {
        let _guard = self.lifecycle.lock().await;

        let cluster = self.cluster.write().take();
        let Some(cluster) = cluster else {
            debug!("Shard manager already stopped");
            return Ok(());
        };

        self.transition(LifecycleState::Stopping);
        cluster.shutdown().await;
        self.transition(LifecycleState::Stopped);
        info!("Shard manager stopped");
        Ok(())
    }

    async fn close(&self) -> Result<(), GatewayError> {
        if self.is_running() {
            self.stop().await?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.cluster
            .read()
            .as_ref()
            .is_some_and(|cluster| cluster.shards_running() > 0)
    }

    fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }
}

impl Gateway for ShardedManager {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Sharded
    }

    fn statuses(&self) -> Vec<(ShardInfo, SessionStatus)> {
        self.cluster
            .read()
            .as_ref()
            .map(|cluster| {
                cluster
                    .shards()
                    .iter()
                    .map(|shard| (shard.shard(), shard.status()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn gateway_latency(&self) -> Option<Duration> {
        let cluster = self.cluster.read().clone()?;
        average_latency(cluster.shards().iter().map(|shard| shard.latency()))
    }

    fn shards_total(&self) -> u32 {
        self.cluster
            .read()
            .as_ref()
            .map_or(0, |cluster| cluster.shards_total())
    }

    fn shards_running(&self) -> u32 {
        self.cluster
            .read()
            .as_ref()
            .map_or(0, |cluster| cluster.shards_running())
    }
}
