//! Query filters and read-model types used across the platform

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{LedgerEntry, OperationKind, StockRecord};

/// Filters for the stock movement history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementQuery {
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub operation_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<OperationKind>,
    pub limit: Option<u32>,
}

impl MovementQuery {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.product_id.map_or(true, |id| entry.product_id == id)
            && self.location_id.map_or(true, |id| entry.touches_location(id))
            && self.operation_id.map_or(true, |id| entry.operation_id == id)
            && self.kind.map_or(true, |kind| entry.kind == kind)
    }

    /// Page size, falling back to `default` and capped at `max`
    pub fn effective_limit(&self, default: u32, max: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, max.max(1))
    }
}

/// Filters for listing stock rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockFilter {
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

impl StockFilter {
    pub fn matches(&self, record: &StockRecord) -> bool {
        self.product_id.map_or(true, |id| record.product_id == id)
            && self.location_id.map_or(true, |id| record.location_id == id)
    }
}

/// A stock row below its product's reorder threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub product_id: Uuid,
    pub product_code: String,
    pub product_name: String,
    pub location_id: Uuid,
    pub qty: i64,
    pub reorder_threshold: i64,
}

/// Counters for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub total_products: i64,
    pub total_locations: i64,
    pub pending_receipts: i64,
    pub pending_deliveries: i64,
}

/// A ledger entry with the codes and names of what it refers to.
///
/// Names are `None` only when the catalog row has since been removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementView {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub location_code: Option<String>,
    pub location_name: Option<String>,
    pub location_from_name: Option<String>,
    pub location_to_name: Option<String>,
}

/// Dashboard overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub counts: DashboardCounts,
    pub recent_activity: Vec<MovementView>,
    pub low_stock: Vec<LowStockItem>,
}

/// Result of reconciling a stock row against its ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAudit {
    pub product_id: Uuid,
    pub location_id: Uuid,
    /// On-hand quantity of the stock row, 0 when absent
    pub qty: i64,
    /// Sum of every ledger `qty_change` for the pair
    pub ledger_total: i64,
    pub entry_count: i64,
    pub consistent: bool,
}
