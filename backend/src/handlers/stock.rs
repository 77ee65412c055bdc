//! HTTP handlers for stock levels, reservations and movements

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{MovementQuery, MovementView, StockAudit, StockFilter, StockKey, StockRecord};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QuantityInput {
    pub qty: i64,
}

/// List stock rows, optionally for one product and/or location
pub async fn list_stock(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<StockRecord>>> {
    let records = state.engine.list_stock(&filter).await?;
    Ok(Json(records))
}

pub async fn get_stock(
    State(state): State<AppState>,
    Path((product_id, location_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockRecord>> {
    let key = StockKey::new(product_id, location_id);
    let record = state
        .engine
        .get_stock(key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock record for {}", key)))?;
    Ok(Json(record))
}

/// Reconcile a stock row with its ledger
pub async fn audit_stock(
    State(state): State<AppState>,
    Path((product_id, location_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockAudit>> {
    let audit = state
        .engine
        .audit_stock(StockKey::new(product_id, location_id))
        .await?;
    Ok(Json(audit))
}

pub async fn reserve_stock(
    State(state): State<AppState>,
    Path((product_id, location_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<QuantityInput>,
) -> AppResult<Json<StockRecord>> {
    let record = state
        .engine
        .reserve(StockKey::new(product_id, location_id), input.qty)
        .await?;
    Ok(Json(record))
}

pub async fn release_stock(
    State(state): State<AppState>,
    Path((product_id, location_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<QuantityInput>,
) -> AppResult<Json<StockRecord>> {
    let record = state
        .engine
        .release(StockKey::new(product_id, location_id), input.qty)
        .await?;
    Ok(Json(record))
}

/// Stock movement history, most recent first
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
) -> AppResult<Json<Vec<MovementView>>> {
    let movements = state.engine.movement_history(&query).await?;
    Ok(Json(movements))
}
