use energy_daily::{
    config::Config,
    kafka::{create_consumer, run_consumer},
    store::MemoryStore,
    ws::{create_router, AppState},
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "energy_daily=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting energy-daily service");

    // Load configuration
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());

    let config = Config::load(&config_path)?;
    info!("Configuration loaded from: {}", config_path);

    let settings = config.site.settings()?;
    info!(
        "Serving site {} with {} intervals at UTC{}",
        settings.site_id, settings.interval_length, settings.utc_offset
    );

    // Day documents replicated from Kafka
    let store = MemoryStore::new();

    let consumer = create_consumer(
        &config.kafka.brokers,
        &config.kafka.group_id,
        &config.kafka.auto_offset_reset,
    )?;
    info!(
        "Kafka consumer created: group_id={}, brokers={}",
        config.kafka.group_id, config.kafka.brokers
    );

    // Spawn Kafka consumer task
    let topic = config.kafka.topic.clone();
    let ingest_store = store.clone();
    let ingest_settings = settings.clone();
    tokio::spawn(async move {
        if let Err(e) = run_consumer(consumer, topic, ingest_store, ingest_settings).await {
            error!("Kafka consumer error: {}", e);
        }
    });

    let state = Arc::new(AppState::new(
        Arc::new(store),
        settings,
        config.server.max_connections,
    ));
    let app = create_router(state);

    // Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server ready to accept WebSocket connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
