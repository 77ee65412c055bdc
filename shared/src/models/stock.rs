//! Stock quantity models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one stock row: a product held at a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: Uuid,
    pub location_id: Uuid,
}

impl StockKey {
    pub fn new(product_id: Uuid, location_id: Uuid) -> Self {
        Self {
            product_id,
            location_id,
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "product {} at location {}", self.product_id, self.location_id)
    }
}

/// Quantity on hand and reserved for one (product, location) pair.
///
/// Rows are created lazily the first time stock is touched at a pair and are
/// never deleted, only zeroed. After every successful operation
/// `0 <= reserved <= qty` holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub qty: i64,
    pub reserved: i64,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// A zeroed row, as created by the first touch at `key`
    pub fn empty(key: StockKey, now: DateTime<Utc>) -> Self {
        Self {
            product_id: key.product_id,
            location_id: key.location_id,
            qty: 0,
            reserved: 0,
            updated_at: now,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.location_id)
    }

    /// Quantity free for new reservations and withdrawals
    pub fn available(&self) -> i64 {
        self.qty - self.reserved
    }
}
