//! Fixtures shared by the backend integration tests

#![allow(dead_code)]

use std::sync::Arc;

use shared::{
    AdjustmentLine, DeliveryLine, Location, LocationType, NewLocation, NewOperation, NewProduct,
    Operation, OperationBody, Product, ReceiptLine, StockKey, TransferLine,
};
use uuid::Uuid;
use wims_backend::storage::{InventoryStore, MemoryStore};
use wims_backend::{EngineConfig, StockEngine};

pub struct Fixture {
    pub engine: StockEngine,
    pub user: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn InventoryStore>, config: EngineConfig) -> Self {
        Self {
            engine: StockEngine::new(store, config),
            user: Uuid::new_v4(),
        }
    }

    pub async fn product(&self, code: &str) -> Product {
        self.product_with_threshold(code, None).await
    }

    pub async fn product_with_threshold(&self, code: &str, threshold: Option<i64>) -> Product {
        self.engine
            .create_product(
                NewProduct {
                    code: code.to_string(),
                    name: format!("Product {}", code),
                    category: None,
                    unit_of_measure: "unit".to_string(),
                    reorder_threshold: threshold,
                    reorder_target: None,
                },
                Some(self.user),
            )
            .await
            .expect("create product")
    }

    pub async fn location(&self, code: &str) -> Location {
        self.engine
            .create_location(NewLocation {
                code: code.to_string(),
                name: format!("Location {}", code),
                location_type: LocationType::Warehouse,
                parent_id: None,
            })
            .await
            .expect("create location")
    }

    pub async fn draft(&self, reference: &str, body: OperationBody) -> Operation {
        self.engine
            .create_operation(
                NewOperation {
                    reference: reference.to_string(),
                    note: None,
                    body,
                },
                self.user,
            )
            .await
            .expect("create operation")
    }

    /// Receive `qty` of `product` at `location` through a validated receipt
    pub async fn receive(&self, product: Uuid, location: Uuid, qty: i64) -> Operation {
        let op = self
            .draft("WH/IN/SEED", receipt(vec![(product, location, qty)]))
            .await;
        self.engine
            .validate_operation(op.kind(), op.id, self.user)
            .await
            .expect("validate receipt");
        op
    }

    pub async fn qty(&self, product: Uuid, location: Uuid) -> i64 {
        self.engine
            .get_stock(StockKey::new(product, location))
            .await
            .expect("get stock")
            .map_or(0, |r| r.qty)
    }

    pub async fn reserved(&self, product: Uuid, location: Uuid) -> i64 {
        self.engine
            .get_stock(StockKey::new(product, location))
            .await
            .expect("get stock")
            .map_or(0, |r| r.reserved)
    }

    pub async fn status(&self, op: &Operation) -> shared::OperationStatus {
        self.engine
            .get_operation(op.kind(), op.id)
            .await
            .expect("get operation")
            .status
    }
}

pub fn receipt(lines: Vec<(Uuid, Uuid, i64)>) -> OperationBody {
    OperationBody::Receipt {
        vendor_id: None,
        lines: lines
            .into_iter()
            .map(|(product_id, location_id, expected_qty)| ReceiptLine {
                product_id,
                location_id,
                expected_qty,
                note: None,
            })
            .collect(),
    }
}

pub fn delivery(lines: Vec<(Uuid, Uuid, i64)>) -> OperationBody {
    OperationBody::Delivery {
        customer_name: Some("Acme Retail".to_string()),
        lines: lines
            .into_iter()
            .map(|(product_id, location_id, qty)| DeliveryLine {
                product_id,
                location_id,
                qty,
                note: None,
            })
            .collect(),
    }
}

pub fn transfer(from: Uuid, to: Uuid, lines: Vec<(Uuid, i64)>) -> OperationBody {
    OperationBody::Transfer {
        from_location_id: from,
        to_location_id: to,
        lines: lines
            .into_iter()
            .map(|(product_id, qty)| TransferLine {
                product_id,
                qty,
                note: None,
            })
            .collect(),
    }
}

pub fn adjustment(lines: Vec<(Uuid, Uuid, i64)>) -> OperationBody {
    OperationBody::Adjustment {
        reason: Some("cycle count".to_string()),
        lines: lines
            .into_iter()
            .map(|(product_id, location_id, counted_qty)| AdjustmentLine {
                product_id,
                location_id,
                counted_qty,
                note: None,
            })
            .collect(),
    }
}
