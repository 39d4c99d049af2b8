//! Prometheus metrics module
//!
//! The `metrics` macros are no-ops until a recorder is installed, so a
//! detached collector is safe to use in tests and embedding applications.

use crate::error::GatewayError;
use crate::lifecycle::{GatewayMode, LifecycleState};
use metrics::{counter, gauge, describe_counter, describe_gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;
use twilight_model::gateway::event::Event;

/// Gateway metrics collector
#[derive(Clone, Default)]
pub struct GatewayMetrics {
    handle: Option<Arc<PrometheusHandle>>,
}

impl GatewayMetrics {
    /// Install the global Prometheus recorder and return a collector that can render it
    pub fn install() -> Result<Self, GatewayError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| {
                GatewayError::Config(format!("failed to install Prometheus recorder: {e}"))
            })?;

        Self::register_metrics();

        Ok(Self {
            handle: Some(Arc::new(handle)),
        })
    }

    /// Collector without an exporter
    pub fn detached() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions
    fn register_metrics() {
        describe_counter!(
            "gateway_events_received_total",
            Unit::Count,
            "Total events received from Discord"
        );
        describe_counter!(
            "gateway_errors_total",
            Unit::Count,
            "Total gateway errors"
        );
        describe_counter!(
            "gateway_lifecycle_events_total",
            Unit::Count,
            "Lifecycle milestones published"
        );
        describe_counter!(
            "gateway_command_reconciliations_total",
            Unit::Count,
            "Command reconciliations by outcome"
        );

        describe_gauge!(
            "gateway_lifecycle_state",
            Unit::Count,
            "Lifecycle state (0=stopped, 1=starting, 2=semi_ready, 3=ready, 4=stopping)"
        );
        describe_gauge!(
            "gateway_guilds_total",
            Unit::Count,
            "Total guilds across all shards"
        );
        describe_gauge!(
            "gateway_latency_seconds",
            Unit::Seconds,
            "Average heartbeat round-trip per shard"
        );
        describe_gauge!(
            "gateway_commands_registered",
            Unit::Count,
            "Commands in the registry after reconciliation"
        );
    }

    /// Record an event received
    pub fn record_event(&self, shard_id: u32, event: &Event) {
        let event_type = match event {
            Event::GuildCreate(_) => "guild_create",
            Event::GuildDelete(_) => "guild_delete",
            Event::InteractionCreate(_) => "interaction_create",
            Event::Ready(_) => "ready",
            Event::Resumed => "resumed",
            Event::GatewayHeartbeatAck => "heartbeat_ack",
            _ => "other",
        };

        counter!(
            "gateway_events_received_total",
            "shard_id" => shard_id.to_string(),
            "event_type" => event_type
        )
        .increment(1);
    }

    /// Record gateway error
    pub fn record_error(&self, error_type: &'static str) {
        counter!("gateway_errors_total", "error_type" => error_type).increment(1);
    }

    /// Record a lifecycle state transition
    pub fn set_lifecycle_state(&self, mode: GatewayMode, state: LifecycleState) {
        gauge!("gateway_lifecycle_state", "mode" => mode.as_str()).set(state.ordinal() as f64);
    }

    /// Record a published lifecycle milestone
    pub fn record_milestone(&self, milestone: &'static str) {
        counter!("gateway_lifecycle_events_total", "event" => milestone).increment(1);
    }

    /// Record the outcome of a command reconciliation
    pub fn record_reconciliation(&self, outcome: &'static str, commands: usize) {
        counter!("gateway_command_reconciliations_total", "outcome" => outcome).increment(1);
        gauge!("gateway_commands_registered").set(commands as f64);
    }

    /// Set heartbeat latency for a shard
    pub fn set_latency(&self, shard_id: u32, latency: Duration) {
        gauge!(
            "gateway_latency_seconds",
            "shard_id" => shard_id.to_string()
        )
        .set(latency.as_secs_f64());
    }

    /// Set guild count for a shard
    pub fn set_guilds(&self, shard_id: u32, count: u64) {
        gauge!(
            "gateway_guilds_total",
            "shard_id" => shard_id.to_string()
        )
        .set(count as f64);
    }

    /// Set shard counts by status class
    pub fn set_shards(&self, running: usize, ready: usize) {
        gauge!("gateway_shards_running").set(running as f64);
        gauge!("gateway_shards_ready").set(ready as f64);
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle
            .as_ref()
            .map(|handle| handle.render())
            .unwrap_or_default()
    }
}
