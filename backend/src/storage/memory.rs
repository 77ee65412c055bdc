//! In-memory inventory store
//!
//! The whole state sits behind one `tokio::sync::Mutex`. A unit of work
//! holds the lock for its lifetime and edits the state in place, logging the
//! prior value of everything it touches. Dropping it uncommitted replays
//! that log backwards, so an abandoned unit leaves no trace.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    DashboardCounts, LedgerEntry, Location, LowStockItem, MovementQuery, NewLedgerEntry,
    Operation, OperationKind, OperationStatus, Product, StockFilter, StockKey,
    StockRecord, Vendor,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{CatalogKind, CatalogRef, InventoryStore, LedgerTotals, StockTx};
use crate::engine::ledger::fold_balance;
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    locations: HashMap<Uuid, Location>,
    vendors: HashMap<Uuid, Vendor>,
    operations: HashMap<Uuid, Operation>,
    stock: BTreeMap<StockKey, StockRecord>,
    ledger: Vec<LedgerEntry>,
    next_seq: i64,
}

/// Prior value of one entry touched by an open unit of work
#[derive(Debug)]
enum Undo {
    Product(Uuid, Option<Product>),
    Location(Uuid, Option<Location>),
    Vendor(Uuid, Option<Vendor>),
    Operation(Uuid, Option<Operation>),
    Stock(StockKey, Option<StockRecord>),
    LedgerAppend,
}

fn restore<V>(map: &mut HashMap<Uuid, V>, id: Uuid, prior: Option<V>) {
    match prior {
        Some(value) => {
            map.insert(id, value);
        }
        None => {
            map.remove(&id);
        }
    }
}

impl MemoryState {
    fn revert(&mut self, step: Undo) {
        match step {
            Undo::Product(id, prior) => restore(&mut self.products, id, prior),
            Undo::Location(id, prior) => restore(&mut self.locations, id, prior),
            Undo::Vendor(id, prior) => restore(&mut self.vendors, id, prior),
            Undo::Operation(id, prior) => restore(&mut self.operations, id, prior),
            Undo::Stock(key, Some(record)) => {
                self.stock.insert(key, record);
            }
            Undo::Stock(key, None) => {
                self.stock.remove(&key);
            }
            Undo::LedgerAppend => {
                self.ledger.pop();
                self.next_seq -= 1;
            }
        }
    }

    fn stock_row_mut(&mut self, key: StockKey) -> AppResult<&mut StockRecord> {
        self.stock
            .get_mut(&key)
            .ok_or_else(|| AppError::Persistence(format!("stock row for {} is not locked", key)))
    }

    fn product_referenced(&self, id: Uuid) -> i64 {
        let rows = self.stock.keys().filter(|k| k.product_id == id).count();
        let operations = self
            .operations
            .values()
            .filter(|op| op.body.product_ids().contains(&id))
            .count();
        (rows + operations) as i64
    }

    fn location_referenced(&self, id: Uuid) -> i64 {
        let rows = self.stock.keys().filter(|k| k.location_id == id).count();
        let operations = self
            .operations
            .values()
            .filter(|op| op.body.location_ids().contains(&id))
            .count();
        let children = self
            .locations
            .values()
            .filter(|l| l.parent_id == Some(id))
            .count();
        (rows + operations + children) as i64
    }

    fn vendor_referenced(&self, id: Uuid) -> i64 {
        self.operations
            .values()
            .filter(|op| op.body.vendor_id() == Some(id))
            .count() as i64
    }
}

/// Process-local store; cloning shares the same state
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTx {
    state: OwnedMutexGuard<MemoryState>,
    undo: Vec<Undo>,
}

impl MemoryTx {
    /// Log the current value of a stock row before it is changed
    fn save_row(&mut self, key: StockKey) -> AppResult<&mut StockRecord> {
        let row = self.state.stock_row_mut(key)?;
        self.undo.push(Undo::Stock(key, Some(row.clone())));
        Ok(row)
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        while let Some(step) = self.undo.pop() {
            self.state.revert(step);
        }
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StockTx>> {
        let state = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTx {
            state,
            undo: Vec::new(),
        }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_stock(&self, key: StockKey) -> AppResult<Option<StockRecord>> {
        let state = self.state.lock().await;
        Ok(state.stock.get(&key).cloned())
    }

    async fn list_stock(&self, filter: &StockFilter) -> AppResult<Vec<StockRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .stock
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn list_movements(
        &self,
        query: &MovementQuery,
        limit: u32,
    ) -> AppResult<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn ledger_totals(&self, key: StockKey) -> AppResult<LedgerTotals> {
        let state = self.state.lock().await;
        let entries: Vec<&LedgerEntry> =
            state.ledger.iter().filter(|e| e.key() == key).collect();
        Ok(LedgerTotals {
            qty_change: fold_balance(entries.iter().copied()),
            entries: entries.len() as i64,
        })
    }

    async fn get_operation(&self, id: Uuid) -> AppResult<Option<Operation>> {
        let state = self.state.lock().await;
        Ok(state.operations.get(&id).cloned())
    }

    async fn list_operations(
        &self,
        kind: OperationKind,
        status: Option<OperationStatus>,
    ) -> AppResult<Vec<Operation>> {
        let state = self.state.lock().await;
        let mut operations: Vec<Operation> = state
            .operations
            .values()
            .filter(|op| op.kind() == kind && status.map_or(true, |s| op.status == s))
            .cloned()
            .collect();
        operations.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.reference.cmp(&a.reference))
        });
        Ok(operations)
    }

    async fn dashboard_counts(&self) -> AppResult<DashboardCounts> {
        let state = self.state.lock().await;
        let pending = |kind: OperationKind| {
            state
                .operations
                .values()
                .filter(|op| op.kind() == kind && op.status.is_pending())
                .count() as i64
        };
        Ok(DashboardCounts {
            total_products: state.products.len() as i64,
            total_locations: state.locations.len() as i64,
            pending_receipts: pending(OperationKind::Receipt),
            pending_deliveries: pending(OperationKind::Delivery),
        })
    }

    async fn low_stock(&self, limit: u32) -> AppResult<Vec<LowStockItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<LowStockItem> = state
            .stock
            .values()
            .filter_map(|record| {
                let product = state.products.get(&record.product_id)?;
                let threshold = product.reorder_threshold?;
                (record.qty < threshold).then(|| LowStockItem {
                    product_id: product.id,
                    product_code: product.code.clone(),
                    product_name: product.name.clone(),
                    location_id: record.location_id,
                    qty: record.qty,
                    reorder_threshold: threshold,
                })
            })
            .collect();
        items.sort_by(|a, b| fill_ratio_cmp(a, b).then_with(|| a.product_code.cmp(&b.product_code)));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn get_location(&self, id: Uuid) -> AppResult<Option<Location>> {
        let state = self.state.lock().await;
        Ok(state.locations.get(&id).cloned())
    }

    async fn get_vendor(&self, id: Uuid) -> AppResult<Option<Vendor>> {
        let state = self.state.lock().await;
        Ok(state.vendors.get(&id).cloned())
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(products)
    }

    async fn list_locations(&self) -> AppResult<Vec<Location>> {
        let state = self.state.lock().await;
        let mut locations: Vec<Location> = state.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(locations)
    }

    async fn list_vendors(&self) -> AppResult<Vec<Vendor>> {
        let state = self.state.lock().await;
        let mut vendors: Vec<Vendor> = state.vendors.values().cloned().collect();
        vendors.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(vendors)
    }
}

/// Compare `qty / reorder_threshold` without floating point
fn fill_ratio_cmp(a: &LowStockItem, b: &LowStockItem) -> Ordering {
    let lhs = a.qty as i128 * b.reorder_threshold as i128;
    let rhs = b.qty as i128 * a.reorder_threshold as i128;
    lhs.cmp(&rhs)
}

#[async_trait]
impl StockTx for MemoryTx {
    async fn find_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.state.products.get(&id).cloned())
    }

    async fn find_location(&mut self, id: Uuid) -> AppResult<Option<Location>> {
        Ok(self.state.locations.get(&id).cloned())
    }

    async fn find_vendor(&mut self, id: Uuid) -> AppResult<Option<Vendor>> {
        Ok(self.state.vendors.get(&id).cloned())
    }

    async fn code_in_use(&mut self, kind: CatalogKind, code: &str) -> AppResult<bool> {
        let state = &self.state;
        Ok(match kind {
            CatalogKind::Product => state.products.values().any(|p| p.code == code),
            CatalogKind::Location => state.locations.values().any(|l| l.code == code),
            CatalogKind::Vendor => state.vendors.values().any(|v| v.code == code),
        })
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        let prior = self.state.products.insert(product.id, product.clone());
        self.undo.push(Undo::Product(product.id, prior));
        Ok(())
    }

    async fn insert_location(&mut self, location: &Location) -> AppResult<()> {
        let prior = self.state.locations.insert(location.id, location.clone());
        self.undo.push(Undo::Location(location.id, prior));
        Ok(())
    }

    async fn insert_vendor(&mut self, vendor: &Vendor) -> AppResult<()> {
        let prior = self.state.vendors.insert(vendor.id, vendor.clone());
        self.undo.push(Undo::Vendor(vendor.id, prior));
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        if let Some(stored) = self.state.products.get_mut(&product.id) {
            let prior = std::mem::replace(stored, product.clone());
            self.undo.push(Undo::Product(product.id, Some(prior)));
        }
        Ok(())
    }

    async fn update_location(&mut self, location: &Location) -> AppResult<()> {
        if let Some(stored) = self.state.locations.get_mut(&location.id) {
            let prior = std::mem::replace(stored, location.clone());
            self.undo.push(Undo::Location(location.id, Some(prior)));
        }
        Ok(())
    }

    async fn update_vendor(&mut self, vendor: &Vendor) -> AppResult<()> {
        if let Some(stored) = self.state.vendors.get_mut(&vendor.id) {
            let prior = std::mem::replace(stored, vendor.clone());
            self.undo.push(Undo::Vendor(vendor.id, Some(prior)));
        }
        Ok(())
    }

    async fn count_references(&mut self, item: CatalogRef) -> AppResult<i64> {
        Ok(match item {
            CatalogRef::Product(id) => self.state.product_referenced(id),
            CatalogRef::Location(id) => self.state.location_referenced(id),
            CatalogRef::Vendor(id) => self.state.vendor_referenced(id),
        })
    }

    async fn delete_catalog(&mut self, item: CatalogRef) -> AppResult<()> {
        let step = match item {
            CatalogRef::Product(id) => Undo::Product(id, self.state.products.remove(&id)),
            CatalogRef::Location(id) => Undo::Location(id, self.state.locations.remove(&id)),
            CatalogRef::Vendor(id) => Undo::Vendor(id, self.state.vendors.remove(&id)),
        };
        self.undo.push(step);
        Ok(())
    }

    async fn insert_operation(&mut self, operation: &Operation) -> AppResult<()> {
        let prior = self
            .state
            .operations
            .insert(operation.id, operation.clone());
        self.undo.push(Undo::Operation(operation.id, prior));
        Ok(())
    }

    async fn lock_operation(&mut self, id: Uuid) -> AppResult<Option<Operation>> {
        Ok(self.state.operations.get(&id).cloned())
    }

    async fn update_operation_status(&mut self, operation: &Operation) -> AppResult<()> {
        let stored = self
            .state
            .operations
            .get_mut(&operation.id)
            .ok_or_else(|| AppError::NotFound(format!("Operation {}", operation.id)))?;
        self.undo
            .push(Undo::Operation(operation.id, Some(stored.clone())));
        stored.status = operation.status;
        stored.validated_by = operation.validated_by;
        stored.validated_at = operation.validated_at;
        stored.canceled_by = operation.canceled_by;
        stored.canceled_at = operation.canceled_at;
        Ok(())
    }

    async fn ensure_stock_row(
        &mut self,
        key: StockKey,
        now: DateTime<Utc>,
    ) -> AppResult<StockRecord> {
        if let Some(record) = self.state.stock.get(&key) {
            return Ok(record.clone());
        }
        let record = StockRecord::empty(key, now);
        self.state.stock.insert(key, record.clone());
        self.undo.push(Undo::Stock(key, None));
        Ok(record)
    }

    async fn lock_stock(&mut self, key: StockKey) -> AppResult<Option<StockRecord>> {
        Ok(self.state.stock.get(&key).cloned())
    }

    async fn apply_delta(
        &mut self,
        key: StockKey,
        delta: i64,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        let row = self.save_row(key)?;
        row.qty = row
            .qty
            .checked_add(delta)
            .ok_or(AppError::QuantityOverflow {
                product_id: key.product_id,
                location_id: key.location_id,
            })?;
        row.updated_at = now;
        Ok(row.qty)
    }

    async fn set_reserved(
        &mut self,
        key: StockKey,
        reserved: i64,
        now: DateTime<Utc>,
    ) -> AppResult<StockRecord> {
        let row = self.save_row(key)?;
        row.reserved = reserved;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> AppResult<LedgerEntry> {
        self.state.next_seq += 1;
        let entry = entry.into_entry(Uuid::new_v4(), self.state.next_seq);
        self.state.ledger.push(entry.clone());
        self.undo.push(Undo::LedgerAppend);
        Ok(entry)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut tx = self;
        tx.undo.clear();
        Ok(())
    }
}
