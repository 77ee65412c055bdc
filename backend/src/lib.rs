//! Warehouse stock ledger - backend library
//!
//! The stock engine, its storage backends and the HTTP surface over them.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod storage;

pub use config::Config;
pub use engine::{EngineConfig, StockEngine};
pub use error::{AppError, AppResult};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: StockEngine,
}

impl AppState {
    pub fn new(engine: StockEngine) -> Self {
        Self { engine }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Warehouse Stock Ledger API v1"
}
