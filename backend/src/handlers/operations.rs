//! HTTP handlers for receipts, deliveries, transfers and adjustments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{NewOperation, Operation, OperationKind, OperationStatus};
use uuid::Uuid;

use super::ActingUser;
use crate::engine::ValidationOutcome;
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OperationListQuery {
    pub status: Option<OperationStatus>,
}

/// List operations of one kind
pub async fn list_operations(
    State(state): State<AppState>,
    Path(kind): Path<OperationKind>,
    Query(query): Query<OperationListQuery>,
) -> AppResult<Json<Vec<Operation>>> {
    let operations = state.engine.list_operations(kind, query.status).await?;
    Ok(Json(operations))
}

/// Create a draft operation
pub async fn create_operation(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(kind): Path<OperationKind>,
    Json(input): Json<NewOperation>,
) -> AppResult<(StatusCode, Json<Operation>)> {
    if input.body.kind() != kind {
        return Err(AppError::malformed(
            "type",
            format!("expected '{}', got '{}'", kind.as_str(), input.body.kind().as_str()),
        ));
    }
    let operation = state.engine.create_operation(input, user_id).await?;
    Ok((StatusCode::CREATED, Json(operation)))
}

pub async fn get_operation(
    State(state): State<AppState>,
    Path((kind, operation_id)): Path<(OperationKind, Uuid)>,
) -> AppResult<Json<Operation>> {
    let operation = state.engine.get_operation(kind, operation_id).await?;
    Ok(Json(operation))
}

/// Validate a draft operation, applying its lines to stock
pub async fn validate_operation(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path((kind, operation_id)): Path<(OperationKind, Uuid)>,
) -> AppResult<Json<ValidationOutcome>> {
    let outcome = state
        .engine
        .validate_operation(kind, operation_id, user_id)
        .await?;
    Ok(Json(outcome))
}

/// Cancel a pending operation
pub async fn cancel_operation(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path((kind, operation_id)): Path<(OperationKind, Uuid)>,
) -> AppResult<Json<Operation>> {
    let operation = state
        .engine
        .cancel_operation(kind, operation_id, user_id)
        .await?;
    Ok(Json(operation))
}
