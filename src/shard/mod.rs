//! Shard management module
//!
//! Sessions, the shard pool and the state they share.

mod listener;
mod pool;
mod session;
mod state;

pub use listener::{GatewayListener, ListenerSet};
pub use pool::{ShardCluster, ShardPool};
pub use session::{
    close_session, Session, SessionFactory, ShardInfo, TwilightSession, TwilightSessionFactory,
    SHUTDOWN_GRACE,
};
pub use state::{SessionStatus, ShardState};
