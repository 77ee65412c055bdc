//! HTTP API tests
//!
//! Drive the router with `tower::ServiceExt::oneshot` against an in-memory
//! engine and check status codes and error bodies.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wims_backend::{create_app, AppState, EngineConfig, StockEngine};

fn app() -> Router {
    create_app(AppState::new(StockEngine::in_memory(EngineConfig::default())))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn seed(app: &Router, user: Uuid) -> (String, String) {
    let (status, product) = send(
        app,
        "POST",
        "/api/v1/products",
        Some(user),
        Some(json!({ "code": "SKU-1", "name": "Steel bolt", "unit_of_measure": "unit" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, location) = send(
        app,
        "POST",
        "/api/v1/locations",
        Some(user),
        Some(json!({ "code": "WH-A", "name": "Main warehouse", "location_type": "warehouse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        product["id"].as_str().unwrap().to_string(),
        location["id"].as_str().unwrap().to_string(),
    )
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = send(&app, "GET", "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["storage"], "connected");
    }

    #[tokio::test]
    async fn test_receipt_then_delivery_over_http() {
        let app = app();
        let user = Uuid::new_v4();
        let (product, location) = seed(&app, user).await;

        let (status, receipt) = send(
            &app,
            "POST",
            "/api/v1/operations/receipt",
            Some(user),
            Some(json!({
                "reference": "WH/IN/0001",
                "type": "receipt",
                "lines": [{ "product_id": product, "location_id": location, "expected_qty": 30 }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(receipt["status"], "draft");

        let uri = format!("/api/v1/operations/receipt/{}/validate", receipt["id"].as_str().unwrap());
        let (status, outcome) = send(&app, "POST", &uri, Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["status"], "validated");
        assert_eq!(outcome["balances"][0]["qty"], 30);

        let (status, stock) = send(
            &app,
            "GET",
            &format!("/api/v1/stock/{}/{}", product, location),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stock["qty"], 30);

        let (status, delivery) = send(
            &app,
            "POST",
            "/api/v1/operations/delivery",
            Some(user),
            Some(json!({
                "reference": "WH/OUT/0001",
                "type": "delivery",
                "lines": [{ "product_id": product, "location_id": location, "qty": 50 }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/api/v1/operations/delivery/{}/validate", delivery["id"].as_str().unwrap());
        let (status, error) = send(&app, "POST", &uri, Some(user), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["error"]["code"], "INSUFFICIENT_STOCK");
        assert_eq!(error["error"]["details"]["available"], 30);
        assert_eq!(error["error"]["details"]["requested"], 50);

        let (status, movements) = send(&app, "GET", "/api/v1/movements", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(movements.as_array().unwrap().len(), 1);
        assert_eq!(movements[0]["qty_change"], 30);
        assert_eq!(movements[0]["product_code"], "SKU-1");
        assert_eq!(movements[0]["location_name"], "Main warehouse");
    }

    #[tokio::test]
    async fn test_update_and_fetch_product() {
        let app = app();
        let user = Uuid::new_v4();
        let (product, _) = seed(&app, user).await;
        let uri = format!("/api/v1/products/{}", product);

        let (status, updated) = send(
            &app,
            "PUT",
            &uri,
            Some(user),
            Some(json!({
                "code": "SKU-1",
                "name": "Steel bolt M8",
                "unit_of_measure": "pcs",
                "reorder_threshold": 10
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Steel bolt M8");
        assert_eq!(updated["updated_by"], user.to_string());

        let (status, fetched) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["reorder_threshold"], 10);

        let missing = format!("/api/v1/products/{}", Uuid::new_v4());
        let (status, _) = send(&app, "GET", &missing, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_quantity_above_limit_is_bad_request() {
        let app = app();
        let user = Uuid::new_v4();
        let (product, location) = seed(&app, user).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/operations/receipt",
            Some(user),
            Some(json!({
                "reference": "WH/IN/0004",
                "type": "receipt",
                "lines": [{ "product_id": product, "location_id": location, "expected_qty": i64::MAX }]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "lines[0].expected_qty");
    }

    #[tokio::test]
    async fn test_missing_user_header_is_bad_request() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/products",
            None,
            Some(json!({ "code": "SKU-1", "name": "Steel bolt" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "MALFORMED_INPUT");
        assert_eq!(body["error"]["field"], "x-user-id");
    }

    #[tokio::test]
    async fn test_type_must_match_path() {
        let app = app();
        let user = Uuid::new_v4();
        let (product, location) = seed(&app, user).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/operations/delivery",
            Some(user),
            Some(json!({
                "reference": "WH/IN/0002",
                "type": "receipt",
                "lines": [{ "product_id": product, "location_id": location, "expected_qty": 1 }]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "type");
    }

    #[tokio::test]
    async fn test_unknown_resources_are_not_found() {
        let app = app();
        let user = Uuid::new_v4();

        let uri = format!("/api/v1/operations/receipt/{}/validate", Uuid::new_v4());
        let (status, body) = send(&app, "POST", &uri, Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let uri = format!("/api/v1/stock/{}/{}", Uuid::new_v4(), Uuid::new_v4());
        let (status, _) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts() {
        let app = app();
        let user = Uuid::new_v4();
        seed(&app, user).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/products",
            Some(user),
            Some(json!({ "code": "SKU-1", "name": "Another bolt" })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_dashboard_counts_pending_work() {
        let app = app();
        let user = Uuid::new_v4();
        let (product, location) = seed(&app, user).await;
        send(
            &app,
            "POST",
            "/api/v1/operations/receipt",
            Some(user),
            Some(json!({
                "reference": "WH/IN/0003",
                "type": "receipt",
                "lines": [{ "product_id": product, "location_id": location, "expected_qty": 5 }]
            })),
        )
        .await;

        let (status, body) = send(&app, "GET", "/api/v1/dashboard", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_products"], 1);
        assert_eq!(body["pending_receipts"], 1);
        assert_eq!(body["pending_deliveries"], 0);
    }
}
