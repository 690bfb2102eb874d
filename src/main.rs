use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shiftswap_axum::{db, handlers, notifications, scheduler, startup, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables before LOG_FORMAT / RUST_LOG are read
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "text".to_string()) == "json";

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,shiftswap_axum=debug,tower_http=debug".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        e
    })?;

    let db = db::create_pool(&config.database_url).await.map_err(|e| {
        tracing::error!("Failed to create database pool: {}", e);
        e
    })?;
    tracing::info!("Database pool created successfully");

    db::run_migrations(&db).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        e
    })?;
    tracing::info!("Migrations applied");

    let metrics_state = Arc::new(handlers::setup_metrics_recorder()?);
    tracing::info!("Metrics recorder initialized");

    let (notifier, events) = notifications::channel();
    notifications::spawn_dispatcher(events, config.notify_webhook_url.clone());

    let listen_addr = config.listen_addr.clone();
    let state = Arc::new(AppState::new(db, config, metrics_state, Arc::new(notifier)));

    scheduler::spawn_sweep(state.clone());

    let app = startup::build_router(state)?;

    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
