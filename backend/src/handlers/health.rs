//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: String,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Check storage connectivity
    let storage = match state.engine.store().ping().await {
        Ok(()) => "connected".to_string(),
        Err(_) => "disconnected".to_string(),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage,
    })
}
