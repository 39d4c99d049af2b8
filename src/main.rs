//! Gateway lifecycle service
//!
//! Connects to Discord as one session or a shard set, reconciles the global
//! slash commands declared in `commands_file` and exposes health, readiness
//! and Prometheus metrics over HTTP until SIGTERM/SIGINT.

use anyhow::Result;
use gateway_lifecycle::{
    health::{self, AppState},
    Components, GatewayBuilder, GatewayConfig, GatewayMetrics, Scope,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let gateway_config = GatewayConfig::load()?;

    // Initialize tracing with configured log level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("gateway_lifecycle={}", gateway_config.log_level).parse()?)
                .add_directive("twilight_gateway=info".parse()?)
                .add_directive("twilight_http=warn".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        use_sharding = gateway_config.use_sharding,
        total_shards = gateway_config.total_shards,
        update_commands = gateway_config.update_commands,
        "Starting gateway lifecycle service"
    );

    // Initialize metrics
    let metrics = Arc::new(GatewayMetrics::install()?);
    info!("Prometheus metrics initialized");

    let components =
        Components::new().scope_provider(vec![Scope::Bot, Scope::ApplicationsCommands]);
    let http_port = gateway_config.http_port;

    let runtime = GatewayBuilder::new(gateway_config, components)
        .metrics(Arc::clone(&metrics))
        .build()
        .await?;

    // Start health server
    let app_state = AppState {
        gateway: Arc::clone(&runtime.gateway),
        shard_state: runtime.shard_state.clone(),
        registry: Arc::clone(&runtime.registry),
        metrics: Arc::clone(&metrics),
    };

    let health_router = health::router(app_state);
    let addr: SocketAddr = ([0, 0, 0, 0], http_port).into();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(port = http_port, "Starting HTTP server");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_router).await {
            error!(error = %e, "HTTP server error");
        }
    });

    let gateway = Arc::clone(&runtime.gateway);
    tokio::select! {
        result = gateway.start() => {
            if let Err(e) = result {
                error!(error = %e, "Gateway failed to start");
                gateway.close().await?;
                return Err(e.into());
            }

            match runtime.invite_url().await {
                Ok(url) => info!(%url, "Gateway ready, invite the bot with this URL"),
                Err(e) => warn!(error = %e, "Could not resolve invite URL"),
            }

            shutdown_signal().await;
            info!("Shutdown signal received");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received during startup");
        }
    }

    // Graceful shutdown
    info!("Shutting down gateway...");
    gateway.stop().await?;

    info!("Gateway shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
