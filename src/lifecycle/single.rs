//! Single-session lifecycle manager

use super::{spin_until, Gateway, GatewayMode, Lifecycle, LifecycleState};
use crate::error::GatewayError;
use crate::events::{EventPublisher, LifecycleEvent, LifecycleEventKind};
use crate::metrics::GatewayMetrics;
use crate::shard::{
    close_session, Session, SessionFactory, SessionStatus, ShardInfo, SHUTDOWN_GRACE,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// Drives one gateway session from connect to shutdown
pub struct SingleSessionManager {
    factory: Arc<dyn SessionFactory>,
    publisher: Arc<EventPublisher>,
    metrics: Arc<GatewayMetrics>,
    session: RwLock<Option<Arc<dyn Session>>>,
    /// Serialises start/stop sequences
    lifecycle: Mutex<()>,
    state: watch::Sender<LifecycleState>,
    this: Weak<SingleSessionManager>,
}

impl SingleSessionManager {
    /// Create a stopped manager. The session is only built on the first `start()`.
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        publisher: Arc<EventPublisher>,
        metrics: Arc<GatewayMetrics>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(LifecycleState::Stopped);
        metrics.set_lifecycle_state(GatewayMode::Single, LifecycleState::Stopped);

        Arc::new_cyclic(|this| Self {
            factory,
            publisher,
            metrics,
            session: RwLock::new(None),
            lifecycle: Mutex::new(()),
            state,
            this: this.clone(),
        })
    }

    /// The current session, if one was built and not yet released
    pub fn session(&self) -> Option<Arc<dyn Session>> {
        self.session.read().clone()
    }

    fn transition(&self, state: LifecycleState) {
        let previous = self.state.send_replace(state);
        self.metrics.set_lifecycle_state(GatewayMode::Single, state);
        debug!(from = %previous, to = %state, "Lifecycle transition");
    }

    async fn publish(&self, kind: LifecycleEventKind) -> Result<(), GatewayError> {
        let source: Arc<dyn Gateway> = self.this.upgrade().ok_or(GatewayError::AlreadyShutdown)?;
        self.publisher.publish(LifecycleEvent::new(kind, source)).await
    }

    async fn session_or_connect(&self) -> Result<Arc<dyn Session>, GatewayError> {
        if let Some(session) = self.session() {
            let status = session.status();
            if !status.is_terminal() {
                return Ok(session);
            }
            debug!(shard = %session.shard(), ?status, "Discarding terminated session");
        }

        let session = self.factory.connect().await?;
        *self.session.write() = Some(Arc::clone(&session));
        Ok(session)
    }

    async fn bring_up(&self) -> Result<(), GatewayError> {
        let session = self.session_or_connect().await?;

        spin_until(
            || session.is_running(),
            || {
                let status = session.status();
                status
                    .is_terminal()
                    .then_some(GatewayError::SessionTerminated { status })
            },
        )
        .await?;

        self.transition(LifecycleState::SemiReady);
        info!(shard = %session.shard(), "Gateway session running");
        self.publish(LifecycleEventKind::SemiReady).await?;

        // Readiness is best effort in single-session mode
        if let Err(e) = session.await_ready().await {
            warn!(error = %e, "Interrupted while awaiting gateway readiness, continuing");
        }

        self.transition(LifecycleState::Ready);
        info!(shard = %session.shard(), "Gateway session ready");
        self.publish(LifecycleEventKind::Ready).await
    }

    /// Close and release the session if there is one
    async fn release(&self) -> bool {
        let session = self.session.write().take();
        let Some(session) = session else {
            return false;
        };

        if !session.status().is_terminal() {
            self.transition(LifecycleState::Stopping);
            let forced = close_session(session.as_ref(), SHUTDOWN_GRACE).await;
            info!(shard = %session.shard(), forced, "Gateway session closed");
        }

        self.transition(LifecycleState::Stopped);
        true
    }
}

#[async_trait]
impl Lifecycle for SingleSessionManager {
    async fn start(&self) -> Result<(), GatewayError> {
        let _guard = self.lifecycle.lock().await;

        if self.state() == LifecycleState::Ready && self.is_running() {
            debug!("Gateway session already ready, start ignored");
            return Ok(());
        }

        info!("Starting gateway session");
        self.transition(LifecycleState::Starting);

        let result = self.bring_up().await;
        if let Err(e) = &result {
            error!(error = %e, "Gateway session failed to start");
            self.metrics.record_error(e.error_type_label());
            self.release().await;
            self.transition(LifecycleState::Stopped);
        }
        result
    }

    async fn stop(&self) -> Result<(), GatewayError> {
        let _guard = self.lifecycle.lock().await;

        if self.release().await {
            info!("Gateway session stopped");
        } else {
            debug!("Gateway session already stopped");
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), GatewayError> {
        let _guard = self.lifecycle.lock().await;

        if self.release().await {
            info!("Gateway session released on close");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.session()
            .is_some_and(|session| !session.status().is_terminal())
    }

    fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }
}

impl Gateway for SingleSessionManager {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Single
    }

    fn statuses(&self) -> Vec<(ShardInfo, SessionStatus)> {
        self.session()
            .map(|session| vec![(session.shard(), session.status())])
            .unwrap_or_default()
    }

    fn gateway_latency(&self) -> Option<Duration> {
        self.session().and_then(|session| session.latency())
    }

    fn shards_total(&self) -> u32 {
        1
    }

    fn shards_running(&self) -> u32 {
        u32::from(self.is_running())
    }
}
