//! meetup-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use meetup_gateway::app_state::AppState;
use meetup_gateway::config::GatewayConfig;
use meetup_gateway::domain::EventBus;
use meetup_gateway::persistence::{PostgresPersistence, spawn_event_logger, watch_event_logger};
use meetup_gateway::server::build_app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;
    tracing::info!(
        addr = %config.listen_addr,
        radius = config.meetup.arrival_radius_meters,
        "starting meetup-gateway"
    );

    let event_bus = EventBus::new(config.event_bus_capacity);

    // Optional event log
    if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("failed to connect to PostgreSQL")?;
        let persistence = PostgresPersistence::new(pool);
        persistence
            .ensure_schema()
            .await
            .context("failed to create event log schema")?;
        let logger = spawn_event_logger(persistence, &event_bus, config.cleanup_after_days);
        tokio::spawn(watch_event_logger(logger));
        tracing::info!("event log enabled");
    }

    // Build application state and router
    let app_state = AppState::new(event_bus, config.meetup.clone())?;
    let app = build_app(app_state, Duration::from_secs(config.request_timeout_secs));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
