//! Dashboard handler

use axum::{extract::State, Json};
use shared::DashboardStats;

use crate::error::AppResult;
use crate::AppState;

/// Counters, recent activity and low stock in one call
pub async fn get_dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    let stats = state.engine.dashboard().await?;
    Ok(Json(stats))
}
