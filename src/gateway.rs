//! Gateway assembly
//!
//! Turns a [`GatewayConfig`] and the application's [`Components`] into a
//! running setup: the selected lifecycle manager, the event publisher with the
//! command reconciler registered, the command registry and the shard state
//! used by the health endpoints.

use crate::commands::{
    CommandApi, CommandReconciler, CommandRegistry, HttpCommandApi, ReconcileSettings,
};
use crate::components::Components;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::events::EventPublisher;
use crate::invite::InviteSettings;
use crate::lifecycle::{Gateway, ShardedManager, SingleSessionManager};
use crate::metrics::GatewayMetrics;
use crate::shard::{ListenerSet, ShardPool, ShardState, TwilightSessionFactory};

use std::sync::Arc;
use tracing::info;
use twilight_http::Client;

/// Everything built from configuration
pub struct GatewayRuntime {
    pub gateway: Arc<dyn Gateway>,
    /// Set when running in shard mode, for per-shard listeners
    pub sharded: Option<Arc<ShardedManager>>,
    pub publisher: Arc<EventPublisher>,
    pub registry: Arc<CommandRegistry>,
    pub commands: Arc<HttpCommandApi>,
    pub listeners: ListenerSet,
    pub shard_state: ShardState,
    pub invite: InviteSettings,
}

impl GatewayRuntime {
    /// OAuth2 URL to add the bot to a guild
    pub async fn invite_url(&self) -> Result<String, GatewayError> {
        let application_id = self.commands.application_id().await?;
        Ok(self.invite.url(application_id))
    }
}

pub struct GatewayBuilder {
    config: GatewayConfig,
    components: Components,
    metrics: Arc<GatewayMetrics>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig, components: Components) -> Self {
        Self {
            config,
            components,
            metrics: Arc::new(GatewayMetrics::detached()),
        }
    }

    pub fn metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn build(self) -> Result<GatewayRuntime, GatewayError> {
        let Self {
            config,
            mut components,
            metrics,
        } = self;
        config.validate()?;

        let include_declared = config.annotation_configuration;
        if let Some(path) = &config.commands_file {
            components = components.declare_commands_from_file(path)?;
        }

        let intents = config.intents() | components.intents(include_declared);

        let listeners = ListenerSet::new();
        if config.event_auto_register {
            let mut attached = 0;
            for listener in components.auto_registered_listeners() {
                listeners.add(Arc::clone(listener));
                attached += 1;
            }
            info!(attached, "Gateway listeners auto-registered");
        }

        let http = Arc::new(Client::new(config.token.clone()));
        let commands = Arc::new(HttpCommandApi::new(Arc::clone(&http)));
        let registry = Arc::new(CommandRegistry::new());
        let publisher = Arc::new(EventPublisher::new(Arc::clone(&metrics)));
        let invite = components.invite_settings(include_declared);
        let components = Arc::new(components);

        publisher.register(Arc::new(CommandReconciler::new(
            Arc::clone(&commands) as Arc<dyn CommandApi>,
            components,
            ReconcileSettings {
                update_commands: config.update_commands,
                include_declared,
            },
            Arc::clone(&registry),
            Arc::clone(&metrics),
        )));

        let (gateway, sharded, shard_state) = if config.use_sharding {
            let total_shards = match config.total_shards {
                Some(total) => total,
                None => recommended_shards(&http).await?,
            };
            info!(total_shards, ?intents, "Building shard manager");

            let pool = ShardPool::new(
                total_shards,
                config.token.clone(),
                intents,
                listeners.clone(),
                Arc::clone(&metrics),
            )?;
            let shard_state = pool.state();
            let manager = ShardedManager::new(
                Arc::new(pool),
                Arc::clone(&publisher),
                Arc::clone(&metrics),
            );
            (Arc::clone(&manager) as Arc<dyn Gateway>, Some(manager), shard_state)
        } else {
            info!(?intents, "Building single-session manager");

            let factory = TwilightSessionFactory::new(
                config.token.clone(),
                intents,
                listeners.clone(),
                Arc::clone(&metrics),
            );
            let shard_state = factory.state();
            let manager = SingleSessionManager::new(
                Arc::new(factory),
                Arc::clone(&publisher),
                Arc::clone(&metrics),
            );
            (manager as Arc<dyn Gateway>, None, shard_state)
        };

        Ok(GatewayRuntime {
            gateway,
            sharded,
            publisher,
            registry,
            commands,
            listeners,
            shard_state,
            invite,
        })
    }
}

/// Shard count Discord recommends for this bot
async fn recommended_shards(http: &Client) -> Result<u64, GatewayError> {
    let info = http
        .gateway()
        .authed()
        .await
        .map_err(|e| GatewayError::http("get_gateway_bot", e))?
        .model()
        .await
        .map_err(|e| GatewayError::http("get_gateway_bot", e))?;

    info!(shards = info.shards, "Using recommended shard count");
    Ok(u64::from(info.shards))
}
