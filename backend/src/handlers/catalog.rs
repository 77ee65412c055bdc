//! HTTP handlers for products, locations and vendors

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Location, NewLocation, NewProduct, NewVendor, Product, Vendor};
use uuid::Uuid;

use super::ActingUser;
use crate::error::AppResult;
use crate::AppState;

pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.engine.list_products().await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(input): Json<NewProduct>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = state.engine.create_product(input, Some(user_id)).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.engine.get_product(product_id).await?))
}

/// Replace a product's attributes; its id and creation stamps stay
pub async fn update_product(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<NewProduct>,
) -> AppResult<Json<Product>> {
    let product = state
        .engine
        .update_product(product_id, input, Some(user_id))
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.engine.delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_locations(State(state): State<AppState>) -> AppResult<Json<Vec<Location>>> {
    Ok(Json(state.engine.list_locations().await?))
}

pub async fn create_location(
    State(state): State<AppState>,
    Json(input): Json<NewLocation>,
) -> AppResult<(StatusCode, Json<Location>)> {
    let location = state.engine.create_location(input).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn get_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> AppResult<Json<Location>> {
    Ok(Json(state.engine.get_location(location_id).await?))
}

pub async fn update_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
    Json(input): Json<NewLocation>,
) -> AppResult<Json<Location>> {
    Ok(Json(state.engine.update_location(location_id, input).await?))
}

pub async fn delete_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.engine.delete_location(location_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_vendors(State(state): State<AppState>) -> AppResult<Json<Vec<Vendor>>> {
    Ok(Json(state.engine.list_vendors().await?))
}

pub async fn create_vendor(
    State(state): State<AppState>,
    Json(input): Json<NewVendor>,
) -> AppResult<(StatusCode, Json<Vendor>)> {
    let vendor = state.engine.create_vendor(input).await?;
    Ok((StatusCode::CREATED, Json(vendor)))
}

pub async fn get_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> AppResult<Json<Vendor>> {
    Ok(Json(state.engine.get_vendor(vendor_id).await?))
}

pub async fn update_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
    Json(input): Json<NewVendor>,
) -> AppResult<Json<Vendor>> {
    Ok(Json(state.engine.update_vendor(vendor_id, input).await?))
}

pub async fn delete_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.engine.delete_vendor(vendor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
