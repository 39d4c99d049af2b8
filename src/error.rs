//! Domain error types for the gateway lifecycle layer
//!
//! Structured thiserror types for navigable diagnostics and compile-time
//! exhaustive handling.
//!
//! main.rs is the ONLY module allowed to use anyhow::Result (process boundary).
//! All library code returns Result<T, GatewayError>.

use crate::shard::SessionStatus;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Gateway domain errors
///
/// Every variant carries structured context fields for diagnostics.
/// On-call engineers can pattern-match on the variant to understand
/// the failure mode without parsing error message strings.
///
/// Example log output:
/// ```text
/// GatewayError::ShardStartup { shard_id: 3, .. }
/// → "shard 3 failed to become ready"
/// ```
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration error (value missing, blank or invalid)
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration sources could not be read or deserialized
    #[error("configuration source error")]
    ConfigSource(#[from] config::ConfigError),

    /// Two locally declared commands share a name
    #[error("command '{name}' is already registered")]
    DuplicateCommand { name: String },

    /// Command registry queried before reconciliation populated it
    #[error("command registry is not initialized until the gateway reaches semi-ready")]
    RegistryNotInitialized,

    /// Lifecycle operation on a manager that has already been stopped
    #[error("gateway is already shut down")]
    AlreadyShutdown,

    /// Session stopped before it ever reported running
    #[error("session terminated with status {status:?} before it was running")]
    SessionTerminated { status: SessionStatus },

    /// Waiting for readiness was cut short (shard died or was shut down)
    #[error("shard {shard_id} stopped with status {status:?} while awaiting readiness")]
    ReadyInterrupted { shard_id: u32, status: SessionStatus },

    /// A shard failed to become ready during multi-shard startup
    #[error("shard {shard_id} failed to become ready")]
    ShardStartup {
        shard_id: u32,
        #[source]
        source: Box<GatewayError>,
    },

    /// Fetching the remotely registered commands failed
    #[error("failed to retrieve registered commands")]
    CommandRetrieval(#[source] BoxError),

    /// Overwriting the remotely registered commands failed
    #[error("failed to upload {count} commands")]
    CommandUpload {
        count: usize,
        #[source]
        source: BoxError,
    },

    /// A command could not be converted to or from Discord's wire shape
    #[error("command '{name}' could not be converted")]
    CommandCodec {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP request to Discord failed
    #[error("discord HTTP request '{operation}' failed")]
    Http {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// Shard exceeded consecutive error threshold (circuit breaker tripped)
    #[error("shard {shard_id} exceeded consecutive error threshold ({count}/{max})")]
    ShardCircuitBroken { shard_id: u32, count: u32, max: u32 },

    /// Shard reconnection failed, the shard is marked dead
    #[error("shard {shard_id} reconnection failed")]
    ShardReconnectFailed {
        shard_id: u32,
        #[source]
        source: BoxError,
    },

    /// Shard ID overflow: u64 value exceeds u32::MAX (Twilight API boundary)
    #[error("shard ID overflow: {value} exceeds u32::MAX")]
    ShardIdOverflow { value: u64 },
}

impl GatewayError {
    /// Wrap an HTTP-layer failure for the named operation.
    pub fn http(
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Http {
            operation,
            source: Box::new(source),
        }
    }

    /// Returns a static label string suitable for Prometheus metrics.
    ///
    /// Used as the `error_type` label on `gateway_errors_total` counter,
    /// enabling per-error-type monitoring and alerting.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::ConfigSource(_) => "config_source",
            Self::DuplicateCommand { .. } => "duplicate_command",
            Self::RegistryNotInitialized => "registry_uninitialized",
            Self::AlreadyShutdown => "already_shutdown",
            Self::SessionTerminated { .. } => "session_terminated",
            Self::ReadyInterrupted { .. } => "ready_interrupted",
            Self::ShardStartup { .. } => "shard_startup",
            Self::CommandRetrieval(_) => "command_retrieval",
            Self::CommandUpload { .. } => "command_upload",
            Self::CommandCodec { .. } => "command_codec",
            Self::Http { .. } => "http",
            Self::ShardCircuitBroken { .. } => "circuit_broken",
            Self::ShardReconnectFailed { .. } => "reconnect_failed",
            Self::ShardIdOverflow { .. } => "shard_overflow",
        }
    }

    /// Configuration problems are fatal before any network activity.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::ConfigSource(_) | Self::DuplicateCommand { .. }
        )
    }
}
