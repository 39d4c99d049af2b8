//! Gateway lifecycle
//!
//! Two managers share one contract: [`SingleSessionManager`] drives one
//! session, [`ShardedManager`] drives a shard set. Both block `start()` until
//! the gateway is ready and publish lifecycle milestones on the way:
//!
//! ```text
//! Stopped -> Starting -> SemiReady -> Ready -> Stopping -> Stopped
//!                           |            ^
//!                   (AllShardsCreated, shard mode only)
//! ```

mod sharded;
mod single;

pub use sharded::ShardedManager;
pub use single::SingleSessionManager;

use crate::error::GatewayError;
use crate::shard::{SessionStatus, ShardInfo};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

/// Lifecycle state of a gateway manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    SemiReady,
    Ready,
    Stopping,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::SemiReady => "semi_ready",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        }
    }

    /// Position in the startup sequence, used as the metrics gauge value
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Starting => 1,
            Self::SemiReady => 2,
            Self::Ready => 3,
            Self::Stopping => 4,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection mode of a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayMode {
    Single,
    Sharded,
}

impl GatewayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Sharded => "sharded",
        }
    }
}

impl fmt::Display for GatewayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start/stop contract driven by the host application
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Bring the gateway up, returning once it is ready.
    ///
    /// Lifecycle listeners run inside this call; they must not call back into
    /// `start` or `stop`.
    async fn start(&self) -> Result<(), GatewayError>;

    /// Shut the gateway down. Stopping a stopped gateway is a no-op.
    async fn stop(&self) -> Result<(), GatewayError>;

    /// Release everything still running, whether or not `stop` was called.
    async fn close(&self) -> Result<(), GatewayError>;

    fn is_running(&self) -> bool;

    fn state(&self) -> LifecycleState;

    fn subscribe_state(&self) -> watch::Receiver<LifecycleState>;
}

/// Facade over either connection mode
pub trait Gateway: Lifecycle {
    fn mode(&self) -> GatewayMode;

    /// Status of every session, ordered by shard index
    fn statuses(&self) -> Vec<(ShardInfo, SessionStatus)>;

    /// Gateway round-trip averaged over every session with a measurement
    fn gateway_latency(&self) -> Option<Duration>;

    fn shards_total(&self) -> u32;

    fn shards_running(&self) -> u32;
}

/// Average of the latencies that have been measured
fn average_latency(latencies: impl Iterator<Item = Option<Duration>>) -> Option<Duration> {
    let measured: Vec<Duration> = latencies.flatten().collect();
    if measured.is_empty() {
        return None;
    }
    Some(measured.iter().sum::<Duration>() / measured.len() as u32)
}

/// Cooperatively poll `condition` until it holds.
///
/// `abort` is checked between polls and ends the wait with its error.
async fn spin_until(
    mut condition: impl FnMut() -> bool,
    mut abort: impl FnMut() -> Option<GatewayError>,
) -> Result<(), GatewayError> {
    loop {
        if condition() {
            return Ok(());
        }
        if let Some(err) = abort() {
            return Err(err);
        }
        tokio::task::yield_now().await;
    }
}
