//! Warehouse Stock Ledger - Backend Server
//!
//! Tracks per-location stock of products and applies receipts, deliveries,
//! transfers and adjustments to it through an append-only ledger.

use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wims_backend::config::{Config, LogFormat, StorageBackend};
use wims_backend::storage::{InventoryStore, MemoryStore, PgStore};
use wims_backend::{create_app, AppState, EngineConfig, StockEngine};

const DEFAULT_LOG_FILTER: &str = "wims_server=debug,wims_backend=debug,tower_http=debug,sqlx=warn";

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    init_tracing(config.logging.format);

    tracing::info!("Starting Warehouse Stock Ledger Server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn InventoryStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
                .connect(&config.database.url)
                .await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            Arc::new(PgStore::new(db_pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; all data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = StockEngine::new(store, EngineConfig::from(&config.engine));
    tracing::info!(
        release_policy = ?engine.config().release_policy,
        record_zero_adjustments = engine.config().record_zero_adjustments,
        "Stock engine ready"
    );

    // Build application
    let app = create_app(AppState::new(engine));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
