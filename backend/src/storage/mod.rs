//! Persistence seam for the stock engine
//!
//! `InventoryStore` is the read surface plus a factory for units of work.
//! Every mutation goes through a `StockTx`: its effects become visible only
//! on `commit`, and dropping it uncommitted discards all of them.
//!
//! Two backends:
//! - **Memory**: one tokio mutex around the whole state; a unit of work edits
//!   it in place and keeps an undo log (tests and local development)
//! - **Postgres**: a `sqlx` transaction per unit of work with `SELECT ... FOR UPDATE`
//!   row locks

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    DashboardCounts, LedgerEntry, Location, LowStockItem, MovementQuery, NewLedgerEntry,
    Operation, OperationKind, OperationStatus, Product, StockFilter, StockKey, StockRecord,
    Vendor,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Catalog table addressed by a code lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Product,
    Location,
    Vendor,
}

impl CatalogKind {
    pub fn label(&self) -> &'static str {
        match self {
            CatalogKind::Product => "Product",
            CatalogKind::Location => "Location",
            CatalogKind::Vendor => "Vendor",
        }
    }
}

/// One catalog row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogRef {
    Product(Uuid),
    Location(Uuid),
    Vendor(Uuid),
}

impl CatalogRef {
    pub fn kind(&self) -> CatalogKind {
        match self {
            CatalogRef::Product(_) => CatalogKind::Product,
            CatalogRef::Location(_) => CatalogKind::Location,
            CatalogRef::Vendor(_) => CatalogKind::Vendor,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            CatalogRef::Product(id) | CatalogRef::Location(id) | CatalogRef::Vendor(id) => *id,
        }
    }
}

impl std::fmt::Display for CatalogRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind().label(), self.id())
    }
}

/// Sum and number of ledger entries recorded for one stock row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    pub qty_change: i64,
    pub entries: i64,
}

/// Read surface and unit-of-work factory
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> AppResult<Box<dyn StockTx>>;

    /// Cheap liveness probe of the backing storage
    async fn ping(&self) -> AppResult<()>;

    async fn get_stock(&self, key: StockKey) -> AppResult<Option<StockRecord>>;

    async fn list_stock(&self, filter: &StockFilter) -> AppResult<Vec<StockRecord>>;

    /// Ledger entries matching `query`, most recent first
    async fn list_movements(&self, query: &MovementQuery, limit: u32)
        -> AppResult<Vec<LedgerEntry>>;

    async fn ledger_totals(&self, key: StockKey) -> AppResult<LedgerTotals>;

    async fn get_operation(&self, id: Uuid) -> AppResult<Option<Operation>>;

    /// Operations of one kind, newest first
    async fn list_operations(
        &self,
        kind: OperationKind,
        status: Option<OperationStatus>,
    ) -> AppResult<Vec<Operation>>;

    async fn dashboard_counts(&self) -> AppResult<DashboardCounts>;

    /// Stock rows under their product's reorder threshold, lowest fill ratio first
    async fn low_stock(&self, limit: u32) -> AppResult<Vec<LowStockItem>>;

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>>;

    async fn get_location(&self, id: Uuid) -> AppResult<Option<Location>>;

    async fn get_vendor(&self, id: Uuid) -> AppResult<Option<Vendor>>;

    async fn list_products(&self) -> AppResult<Vec<Product>>;

    async fn list_locations(&self) -> AppResult<Vec<Location>>;

    async fn list_vendors(&self) -> AppResult<Vec<Vendor>>;
}

/// A unit of work; rolled back when dropped without `commit`
#[async_trait]
pub trait StockTx: Send {
    // Catalog
    async fn find_product(&mut self, id: Uuid) -> AppResult<Option<Product>>;

    async fn find_location(&mut self, id: Uuid) -> AppResult<Option<Location>>;

    async fn find_vendor(&mut self, id: Uuid) -> AppResult<Option<Vendor>>;

    async fn code_in_use(&mut self, kind: CatalogKind, code: &str) -> AppResult<bool>;

    async fn insert_product(&mut self, product: &Product) -> AppResult<()>;

    async fn insert_location(&mut self, location: &Location) -> AppResult<()>;

    async fn insert_vendor(&mut self, vendor: &Vendor) -> AppResult<()>;

    /// Overwrite every mutable column of an existing product
    async fn update_product(&mut self, product: &Product) -> AppResult<()>;

    async fn update_location(&mut self, location: &Location) -> AppResult<()>;

    async fn update_vendor(&mut self, vendor: &Vendor) -> AppResult<()>;

    /// Rows that would dangle if `item` were deleted
    async fn count_references(&mut self, item: CatalogRef) -> AppResult<i64>;

    async fn delete_catalog(&mut self, item: CatalogRef) -> AppResult<()>;

    // Operations
    async fn insert_operation(&mut self, operation: &Operation) -> AppResult<()>;

    /// Load an operation and hold it until the unit of work ends
    async fn lock_operation(&mut self, id: Uuid) -> AppResult<Option<Operation>>;

    /// Persist the status and audit stamps of `operation`; lines never change
    async fn update_operation_status(&mut self, operation: &Operation) -> AppResult<()>;

    // Stock
    /// Create the row at zero if absent, then lock it
    async fn ensure_stock_row(&mut self, key: StockKey, now: DateTime<Utc>)
        -> AppResult<StockRecord>;

    /// Lock an existing row
    async fn lock_stock(&mut self, key: StockKey) -> AppResult<Option<StockRecord>>;

    /// Add `delta` to the on-hand quantity of a locked row and return the new quantity
    async fn apply_delta(&mut self, key: StockKey, delta: i64, now: DateTime<Utc>)
        -> AppResult<i64>;

    async fn set_reserved(&mut self, key: StockKey, reserved: i64, now: DateTime<Utc>)
        -> AppResult<StockRecord>;

    // Ledger
    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> AppResult<LedgerEntry>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
