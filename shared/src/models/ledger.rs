//! Stock ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OperationKind, StockKey};

/// An immutable record of one stock quantity change.
///
/// Entries are append-only. Folding `qty_change` over the entries of a
/// (product, location) pair in `seq` order yields the pair's on-hand quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    /// Insertion order; breaks ties between entries sharing a timestamp
    pub seq: i64,
    pub product_id: Uuid,
    /// Location whose balance `balance_after` records
    pub location_id: Uuid,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub operation_id: Uuid,
    pub location_from: Option<Uuid>,
    pub location_to: Option<Uuid>,
    pub qty_change: i64,
    pub balance_after: i64,
    pub note: Option<String>,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.location_id)
    }

    /// Whether the entry concerns `location_id` as its own, source or destination location
    pub fn touches_location(&self, location_id: Uuid) -> bool {
        self.location_id == location_id
            || self.location_from == Some(location_id)
            || self.location_to == Some(location_id)
    }
}

/// A ledger entry before the store assigns its id and sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub kind: OperationKind,
    pub operation_id: Uuid,
    pub location_from: Option<Uuid>,
    pub location_to: Option<Uuid>,
    pub qty_change: i64,
    pub balance_after: i64,
    pub note: Option<String>,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl NewLedgerEntry {
    pub fn into_entry(self, id: Uuid, seq: i64) -> LedgerEntry {
        LedgerEntry {
            id,
            seq,
            product_id: self.product_id,
            location_id: self.location_id,
            kind: self.kind,
            operation_id: self.operation_id,
            location_from: self.location_from,
            location_to: self.location_to,
            qty_change: self.qty_change,
            balance_after: self.balance_after,
            note: self.note,
            user_id: self.user_id,
            timestamp: self.timestamp,
        }
    }
}
