//! In-memory stand-ins for Discord used by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use gateway_lifecycle::commands::{CommandApi, CommandDefinition, RegisteredCommand};
use gateway_lifecycle::shard::{close_session, ListenerSet, SHUTDOWN_GRACE};
use gateway_lifecycle::{
    EventPublisher, Gateway, GatewayError, GatewayListener, GatewayMetrics, LifecycleEvent,
    LifecycleEventKind, LifecycleListener, LifecycleState, Session, SessionFactory, SessionStatus,
    ShardCluster, ShardInfo,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use twilight_model::id::Id;

pub fn metrics() -> Arc<GatewayMetrics> {
    Arc::new(GatewayMetrics::detached())
}

pub fn publisher() -> Arc<EventPublisher> {
    Arc::new(EventPublisher::new(metrics()))
}

fn io_error(message: &str) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::new(std::io::ErrorKind::ConnectionReset, message.to_string()))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Session that reports running after a number of status polls
pub struct FakeSession {
    info: ShardInfo,
    status: watch::Sender<SessionStatus>,
    polls_until_running: AtomicUsize,
    fail_ready: bool,
    hang_on_shutdown: bool,
    shutdown_requested: AtomicBool,
    forced: AtomicBool,
}

impl FakeSession {
    pub fn new(info: ShardInfo) -> Self {
        let (status, _) = watch::channel(SessionStatus::Initializing);
        Self {
            info,
            status,
            polls_until_running: AtomicUsize::new(0),
            fail_ready: false,
            hang_on_shutdown: false,
            shutdown_requested: AtomicBool::new(false),
            forced: AtomicBool::new(false),
        }
    }

    pub fn single() -> Self {
        Self::new(ShardInfo::SINGLE)
    }

    /// Stay `Initializing` for `polls` status reads
    pub fn running_after(self, polls: usize) -> Self {
        self.polls_until_running.store(polls, Ordering::SeqCst);
        self
    }

    /// `await_ready` fails as if the shard died during the handshake
    pub fn failing_ready(mut self) -> Self {
        self.fail_ready = true;
        self
    }

    /// Graceful shutdown never completes
    pub fn hanging_on_shutdown(mut self) -> Self {
        self.hang_on_shutdown = true;
        self
    }

    /// Start out in `status`
    pub fn with_status(self, status: SessionStatus) -> Self {
        self.status.send_replace(status);
        self
    }

    pub fn was_forced(&self) -> bool {
        self.forced.load(Ordering::SeqCst)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn current_status(&self) -> SessionStatus {
        *self.status.borrow()
    }
}

#[async_trait]
impl Session for FakeSession {
    fn shard(&self) -> ShardInfo {
        self.info
    }

    fn status(&self) -> SessionStatus {
        let current = *self.status.borrow();
        if current != SessionStatus::Initializing {
            return current;
        }

        let still_waiting = self
            .polls_until_running
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if still_waiting {
            current
        } else {
            self.status.send_replace(SessionStatus::Connecting);
            SessionStatus::Connecting
        }
    }

    fn latency(&self) -> Option<Duration> {
        Some(Duration::from_millis(40 + u64::from(self.info.number) * 20))
    }

    async fn await_ready(&self) -> Result<(), GatewayError> {
        if self.fail_ready {
            self.status.send_replace(SessionStatus::Dead);
            return Err(GatewayError::ReadyInterrupted {
                shard_id: self.info.number,
                status: SessionStatus::Dead,
            });
        }

        self.status.send_if_modified(|status| {
            if status.is_running() {
                *status = SessionStatus::Ready;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    fn shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        let next = if self.hang_on_shutdown {
            SessionStatus::ShuttingDown
        } else {
            SessionStatus::Shutdown
        };
        self.status.send_replace(next);
    }

    fn shutdown_now(&self) {
        self.forced.store(true, Ordering::SeqCst);
        self.status.send_replace(SessionStatus::Shutdown);
    }

    async fn await_shutdown(&self) {
        let mut rx = self.status.subscribe();
        let _ = rx.wait_for(|s| s.is_terminal()).await;
    }
}

/// Hands out prepared sessions, or fresh ones once the queue is empty
#[derive(Default)]
pub struct FakeFactory {
    prepared: Mutex<VecDeque<Arc<FakeSession>>>,
    connects: AtomicUsize,
    fail_connect: AtomicBool,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_session(session: FakeSession) -> (Arc<Self>, Arc<FakeSession>) {
        let factory = Self::new();
        let session = factory.prepare(session);
        (factory, session)
    }

    pub fn prepare(&self, session: FakeSession) -> Arc<FakeSession> {
        let session = Arc::new(session);
        self.prepared.lock().push_back(Arc::clone(&session));
        session
    }

    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn connect(&self) -> Result<Arc<dyn Session>, GatewayError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(GatewayError::Config("connect refused".to_string()));
        }

        let session = self
            .prepared
            .lock()
            .pop_front()
            .unwrap_or_else(|| Arc::new(FakeSession::single()));
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Shard cluster
// ---------------------------------------------------------------------------

/// Shard set whose shard `n` reports running after `n` polls
pub struct FakeCluster {
    total: u32,
    failing_shard: Option<u32>,
    hanging_shard: Option<u32>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    listeners: ListenerSet,
    logins: AtomicUsize,
    restarts: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl FakeCluster {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            failing_shard: None,
            hanging_shard: None,
            sessions: Mutex::new(Vec::new()),
            listeners: ListenerSet::new(),
            logins: AtomicUsize::new(0),
            restarts: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn failing_ready_on(mut self, shard_id: u32) -> Self {
        self.failing_shard = Some(shard_id);
        self
    }

    pub fn hanging_on(mut self, shard_id: u32) -> Self {
        self.hanging_shard = Some(shard_id);
        self
    }

    pub fn sessions(&self) -> Vec<Arc<FakeSession>> {
        self.sessions.lock().clone()
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn spawn_sessions(&self) {
        let sessions = (0..self.total)
            .map(|number| {
                let mut session = FakeSession::new(ShardInfo::new(number, self.total))
                    .running_after(number as usize);
                if self.failing_shard == Some(number) {
                    session = session.failing_ready();
                }
                if self.hanging_shard == Some(number) {
                    session = session.hanging_on_shutdown();
                }
                Arc::new(session)
            })
            .collect();
        *self.sessions.lock() = sessions;
    }
}

#[async_trait]
impl ShardCluster for FakeCluster {
    async fn login(&self) -> Result<(), GatewayError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.spawn_sessions();
        Ok(())
    }

    async fn restart(&self) -> Result<(), GatewayError> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.shutdown().await;
        self.spawn_sessions();
        Ok(())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        let sessions = std::mem::take(&mut *self.sessions.lock());
        for session in sessions {
            close_session(session.as_ref(), SHUTDOWN_GRACE).await;
        }
    }

    fn shards_total(&self) -> u32 {
        self.total
    }

    fn shards_running(&self) -> u32 {
        self.sessions
            .lock()
            .iter()
            .filter(|s| s.status().is_running())
            .count() as u32
    }

    fn shards_queued(&self) -> u32 {
        self.sessions
            .lock()
            .iter()
            .filter(|s| s.current_status().is_queued())
            .count() as u32
    }

    fn shards(&self) -> Vec<Arc<dyn Session>> {
        self.sessions
            .lock()
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

// ---------------------------------------------------------------------------
// Command endpoints
// ---------------------------------------------------------------------------

/// Remote command set held in memory; uploads are echoed back with fresh ids
pub struct FakeCommandApi {
    remote: Mutex<Vec<RegisteredCommand>>,
    uploads: Mutex<Vec<Vec<CommandDefinition>>>,
    retrievals: AtomicUsize,
    next_id: AtomicU64,
    fail_retrieval: AtomicBool,
    fail_upload: AtomicBool,
}

pub const APPLICATION_ID: u64 = 1_000_000_000_000_000_001;

impl FakeCommandApi {
    pub fn with_remote(definitions: Vec<CommandDefinition>) -> Arc<Self> {
        let api = Self {
            remote: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            retrievals: AtomicUsize::new(0),
            next_id: AtomicU64::new(1_100_000_000_000_000_000),
            fail_retrieval: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
        };
        let registered = api.register(definitions);
        *api.remote.lock() = registered;
        Arc::new(api)
    }

    fn register(&self, definitions: Vec<CommandDefinition>) -> Vec<RegisteredCommand> {
        definitions
            .into_iter()
            .map(|definition| RegisteredCommand {
                id: Id::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
                application_id: Some(Id::new(APPLICATION_ID)),
                version: Some(Id::new(1)),
                definition,
            })
            .collect()
    }

    pub fn fail_retrieval(&self) {
        self.fail_retrieval.store(true, Ordering::SeqCst);
    }

    pub fn fail_upload(&self) {
        self.fail_upload.store(true, Ordering::SeqCst);
    }

    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<Vec<CommandDefinition>> {
        self.uploads.lock().clone()
    }

    pub fn remote(&self) -> Vec<RegisteredCommand> {
        self.remote.lock().clone()
    }
}

#[async_trait]
impl CommandApi for FakeCommandApi {
    async fn retrieve_commands(&self) -> Result<Vec<RegisteredCommand>, GatewayError> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        if self.fail_retrieval.load(Ordering::SeqCst) {
            return Err(GatewayError::CommandRetrieval(io_error("retrieval failed")));
        }
        Ok(self.remote())
    }

    async fn replace_commands(
        &self,
        commands: &[CommandDefinition],
    ) -> Result<Vec<RegisteredCommand>, GatewayError> {
        self.uploads.lock().push(commands.to_vec());
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(GatewayError::CommandUpload {
                count: commands.len(),
                source: io_error("upload failed"),
            });
        }

        let stored = self.register(commands.to_vec());
        *self.remote.lock() = stored.clone();
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle listeners
// ---------------------------------------------------------------------------

/// One observed lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observed {
    pub kind: LifecycleEventKind,
    pub source_state: LifecycleState,
    pub shards_total: u32,
}

/// Records every event; optionally fails on one kind
#[derive(Default)]
pub struct RecordingListener {
    observed: Mutex<Vec<Observed>>,
    fail_on: Option<LifecycleEventKind>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(kind: LifecycleEventKind) -> Arc<Self> {
        Arc::new(Self {
            observed: Mutex::new(Vec::new()),
            fail_on: Some(kind),
        })
    }

    pub fn observed(&self) -> Vec<Observed> {
        self.observed.lock().clone()
    }

    pub fn kinds(&self) -> Vec<LifecycleEventKind> {
        self.observed().into_iter().map(|o| o.kind).collect()
    }
}

#[async_trait]
impl LifecycleListener for RecordingListener {
    async fn on_lifecycle_event(&self, event: &LifecycleEvent) -> Result<(), GatewayError> {
        let source: &Arc<dyn Gateway> = event.source();
        self.observed.lock().push(Observed {
            kind: event.kind,
            source_state: source.state(),
            shards_total: source.shards_total(),
        });

        if self.fail_on == Some(event.kind) {
            return Err(GatewayError::Config(format!("listener rejected {}", event.kind)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Log output
// ---------------------------------------------------------------------------

/// Collects formatted log lines written while its subscriber is the default
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install a plain-text subscriber on this thread until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let capture = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Lines logged at WARN level
    pub fn warnings(&self) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(" WARN "))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
