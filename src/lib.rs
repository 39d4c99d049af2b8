//! Discord gateway lifecycle layer built on Twilight
//!
//! - Single-session and multi-shard lifecycle managers behind one
//!   [`Lifecycle`]/[`Gateway`] contract
//! - Lifecycle milestones (semi-ready, all shards created, ready) delivered to
//!   [`LifecycleListener`]s
//! - Global slash command reconciliation into a write-once [`CommandRegistry`]
//! - Health endpoints and Prometheus metrics

pub mod commands;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod health;
pub mod invite;
pub mod lifecycle;
pub mod metrics;
pub mod shard;

pub use commands::{
    CommandApi, CommandDefinition, CommandOptionDefinition, CommandProvider, CommandReconciler,
    CommandRegistry, RegisteredCommand,
};
pub use components::Components;
pub use crate::config::GatewayConfig;
pub use error::GatewayError;
pub use events::{EventPublisher, LifecycleEvent, LifecycleEventKind, LifecycleListener};
pub use gateway::{GatewayBuilder, GatewayRuntime};
pub use invite::{InviteSettings, PermissionProvider, Scope, ScopeProvider};
pub use lifecycle::{
    Gateway, GatewayMode, Lifecycle, LifecycleState, ShardedManager, SingleSessionManager,
};
pub use crate::metrics::GatewayMetrics;
pub use shard::{GatewayListener, Session, SessionFactory, SessionStatus, ShardCluster, ShardInfo};
