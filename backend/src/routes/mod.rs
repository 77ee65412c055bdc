//! Route definitions for the warehouse stock ledger

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/dashboard", get(handlers::get_dashboard))
        .nest("/products", product_routes())
        .nest("/locations", location_routes())
        .nest("/vendors", vendor_routes())
        .nest("/operations", operation_routes())
        .nest("/stock", stock_routes())
        .route("/movements", get(handlers::list_movements))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
}

fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_locations).post(handlers::create_location))
        .route(
            "/:location_id",
            get(handlers::get_location)
                .put(handlers::update_location)
                .delete(handlers::delete_location),
        )
}

fn vendor_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_vendors).post(handlers::create_vendor))
        .route(
            "/:vendor_id",
            get(handlers::get_vendor)
                .put(handlers::update_vendor)
                .delete(handlers::delete_vendor),
        )
}

/// Operation routes; `:kind` is receipt, delivery, transfer or adjustment
fn operation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:kind",
            get(handlers::list_operations).post(handlers::create_operation),
        )
        .route("/:kind/:operation_id", get(handlers::get_operation))
        .route(
            "/:kind/:operation_id/validate",
            post(handlers::validate_operation),
        )
        .route("/:kind/:operation_id/cancel", post(handlers::cancel_operation))
}

fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock))
        .route("/:product_id/:location_id", get(handlers::get_stock))
        .route("/:product_id/:location_id/audit", get(handlers::audit_stock))
        .route(
            "/:product_id/:location_id/reserve",
            post(handlers::reserve_stock),
        )
        .route(
            "/:product_id/:location_id/release",
            post(handlers::release_stock),
        )
}
