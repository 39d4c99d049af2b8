//! Gateway sessions
//!
//! A session is one gateway connection. [`TwilightSession`] runs a
//! `twilight_gateway::Shard` on its own task; the lifecycle managers only see
//! the [`Session`] trait.

use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;
use crate::shard::listener::ListenerSet;
use crate::shard::state::{SessionStatus, ShardState};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use twilight_gateway::error::ReceiveMessageErrorType;
use twilight_gateway::{CloseFrame, EventTypeFlags, Intents, MessageSender, Shard, StreamExt as _};
use twilight_model::gateway::{event::Event, ShardId};

/// Time a session gets to drain in-flight work before it is cancelled
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Circuit breaker: mark shard dead after N consecutive errors without success
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Index of a session within its shard set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardInfo {
    pub number: u32,
    pub total: u32,
}

impl ShardInfo {
    /// The info of a session that is not part of a larger set
    pub const SINGLE: ShardInfo = ShardInfo { number: 0, total: 1 };

    pub fn new(number: u32, total: u32) -> Self {
        Self { number, total }
    }
}

impl From<ShardId> for ShardInfo {
    fn from(id: ShardId) -> Self {
        Self::new(id.number(), id.total())
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} / {}]", self.number, self.total)
    }
}

/// One gateway connection
#[async_trait]
pub trait Session: Send + Sync {
    fn shard(&self) -> ShardInfo;

    fn status(&self) -> SessionStatus;

    /// Average heartbeat round-trip, once measured
    fn latency(&self) -> Option<Duration>;

    /// Wait until the handshake finished.
    ///
    /// Fails if the session stops before it gets there.
    async fn await_ready(&self) -> Result<(), GatewayError>;

    /// Ask the session to close gracefully
    fn shutdown(&self);

    /// Cancel all outstanding work immediately
    fn shutdown_now(&self);

    /// Wait until the session has fully stopped
    async fn await_shutdown(&self);

    fn is_running(&self) -> bool {
        self.status().is_running()
    }
}

/// Builds the session of a single-session gateway
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Session>, GatewayError>;
}

/// Close a session, escalating to cancellation after `grace`.
///
/// Returns true if the session had to be cancelled.
pub async fn close_session(session: &dyn Session, grace: Duration) -> bool {
    session.shutdown();
    if tokio::time::timeout(grace, session.await_shutdown()).await.is_ok() {
        return false;
    }

    warn!(
        shard = %session.shard(),
        grace_secs = grace.as_secs(),
        "Session did not close within grace period, cancelling outstanding requests"
    );
    session.shutdown_now();
    session.await_shutdown().await;
    true
}

/// Session backed by a Twilight shard
pub struct TwilightSession {
    info: ShardInfo,
    state: ShardState,
    sender: MessageSender,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TwilightSession {
    /// Spawn the shard's event loop and return a handle to it
    ///
    /// The shard's state entry must already exist in `state`.
    pub fn spawn(
        shard: Shard,
        state: ShardState,
        listeners: ListenerSet,
        metrics: Arc<GatewayMetrics>,
    ) -> Arc<Self> {
        let info = ShardInfo::from(shard.id());
        let sender = shard.sender();
        let task = tokio::spawn(run_shard(shard, state.clone(), listeners, metrics));

        Arc::new(Self {
            info,
            state,
            sender,
            task: Mutex::new(Some(task)),
        })
    }
}

#[async_trait]
impl Session for TwilightSession {
    fn shard(&self) -> ShardInfo {
        self.info
    }

    fn status(&self) -> SessionStatus {
        self.state
            .status(self.info.number)
            .unwrap_or(SessionStatus::Shutdown)
    }

    fn latency(&self) -> Option<Duration> {
        self.state.latency(self.info.number)
    }

    async fn await_ready(&self) -> Result<(), GatewayError> {
        let shard_id = self.info.number;
        let interrupted = |status| GatewayError::ReadyInterrupted { shard_id, status };

        let Some(mut rx) = self.state.subscribe(shard_id) else {
            return Err(interrupted(SessionStatus::Shutdown));
        };

        let status = rx
            .wait_for(|s| s.is_ready() || s.is_shutting_down() || s.is_terminal())
            .await
            .map(|s| *s)
            .map_err(|_| interrupted(SessionStatus::Shutdown))?;

        if status.is_ready() {
            Ok(())
        } else {
            Err(interrupted(status))
        }
    }

    fn shutdown(&self) {
        let shard_id = self.info.number;
        self.state.advance_status(shard_id, SessionStatus::ShuttingDown);

        if let Err(e) = self.sender.close(CloseFrame::NORMAL) {
            // The event loop already ended and owns no connection any more
            debug!(shard_id, error = %e, "Shard already closed");
        }
    }

    fn shutdown_now(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.state.set_status(self.info.number, SessionStatus::Shutdown);
    }

    async fn await_shutdown(&self) {
        let Some(mut rx) = self.state.subscribe(self.info.number) else {
            return;
        };
        let _ = rx.wait_for(|s| s.is_terminal()).await;
    }
}

/// Builds the one session of a non-sharded gateway
pub struct TwilightSessionFactory {
    token: String,
    intents: Intents,
    state: ShardState,
    listeners: ListenerSet,
    metrics: Arc<GatewayMetrics>,
}

impl TwilightSessionFactory {
    pub fn new(
        token: String,
        intents: Intents,
        listeners: ListenerSet,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            token,
            intents,
            state: ShardState::new(std::iter::once(0)),
            listeners,
            metrics,
        }
    }

    /// Get shared state (for health checks)
    pub fn state(&self) -> ShardState {
        self.state.clone()
    }
}

#[async_trait]
impl SessionFactory for TwilightSessionFactory {
    async fn connect(&self) -> Result<Arc<dyn Session>, GatewayError> {
        info!(intents = ?self.intents, "Connecting gateway session");

        self.state.reset(0);
        let shard = Shard::new(ShardId::ONE, self.token.clone(), self.intents);

        Ok(TwilightSession::spawn(
            shard,
            self.state.clone(),
            self.listeners.clone(),
            Arc::clone(&self.metrics),
        ))
    }
}

/// Run a single shard's event loop and record how it ended
async fn run_shard(
    shard: Shard,
    state: ShardState,
    listeners: ListenerSet,
    metrics: Arc<GatewayMetrics>,
) {
    let shard_id = shard.id().number();

    match event_loop(shard, &state, &listeners, &metrics).await {
        Ok(()) => {
            state.set_status(shard_id, SessionStatus::Shutdown);
            info!(shard_id, "Shard event stream ended");
        }
        Err(e) => {
            metrics.record_error(e.error_type_label());
            state.set_status(shard_id, SessionStatus::Dead);
            error!(shard_id, error = %e, "Shard task failed");
        }
    }
}

/// Whether a close frame answers a `shutdown()` of this session
fn close_requested(state: &ShardState, shard_id: u32) -> bool {
    match state.status(shard_id) {
        Some(status) => status.is_shutting_down(),
        None => true,
    }
}

async fn event_loop(
    mut shard: Shard,
    state: &ShardState,
    listeners: &ListenerSet,
    metrics: &GatewayMetrics,
) -> Result<(), GatewayError> {
    let shard_id = shard.id().number();

    state.advance_status(shard_id, SessionStatus::Connecting);
    info!(shard_id, "Shard starting");

    let mut consecutive_errors: u32 = 0;

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => {
                consecutive_errors = 0;
                event
            }
            Err(source) => {
                consecutive_errors += 1;
                warn!(
                    shard_id,
                    error = %source,
                    consecutive = consecutive_errors,
                    "Error receiving event"
                );

                // Immediate fatal: reconnect failure
                if matches!(source.kind(), ReceiveMessageErrorType::Reconnect) {
                    return Err(GatewayError::ShardReconnectFailed {
                        shard_id,
                        source: Box::new(source),
                    });
                }

                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(GatewayError::ShardCircuitBroken {
                        shard_id,
                        count: consecutive_errors,
                        max: MAX_CONSECUTIVE_ERRORS,
                    });
                }

                // Non-fatal transient error
                metrics.record_error("receive_error");
                state.advance_status(shard_id, SessionStatus::Disconnected);
                continue;
            }
        };

        metrics.record_event(shard_id, &event);

        match &event {
            Event::Ready(ready) => {
                state.advance_status(shard_id, SessionStatus::Ready);
                state.set_guilds(shard_id, ready.guilds.len() as u64);
                metrics.set_guilds(shard_id, ready.guilds.len() as u64);
                info!(
                    shard_id,
                    guilds = ready.guilds.len(),
                    session_id = %ready.session_id,
                    "Shard ready"
                );
            }
            Event::Resumed => {
                state.advance_status(shard_id, SessionStatus::Ready);
                info!(shard_id, "Shard resumed");
            }
            Event::GatewayReconnect | Event::GatewayInvalidateSession(_) => {
                state.advance_status(shard_id, SessionStatus::Resuming);
                debug!(shard_id, "Shard reconnecting");
            }
            Event::GatewayClose(frame) => {
                if close_requested(state, shard_id) {
                    // Polling past a requested close would reconnect the shard
                    info!(shard_id, ?frame, "Shard closed on request");
                    return Ok(());
                }
                state.advance_status(shard_id, SessionStatus::Disconnected);
                debug!(shard_id, ?frame, "Gateway connection closed");
            }
            Event::GatewayHeartbeatAck => {
                let latency = shard.latency().average();
                state.record_heartbeat(shard_id, latency);
                if let Some(latency) = latency {
                    metrics.set_latency(shard_id, latency);
                }
            }
            // Guild counts are approximate; observability only
            Event::GuildCreate(_) => state.adjust_guilds(shard_id, true),
            Event::GuildDelete(guild) if guild.unavailable != Some(true) => {
                state.adjust_guilds(shard_id, false)
            }
            _ => {}
        }

        listeners.dispatch(shard_id, &event);
    }

    Ok(())
}
