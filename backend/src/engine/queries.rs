//! Read-only queries, reservations and the ledger audit

use std::collections::HashMap;

use shared::{
    DashboardStats, LedgerEntry, Location, MovementQuery, MovementView, Product, StockAudit,
    StockFilter, StockKey, StockRecord,
};
use uuid::Uuid;

use super::StockEngine;
use crate::error::AppResult;

impl StockEngine {
    /// Current row for a pair; `None` means nothing on hand and nothing reserved
    pub async fn get_stock(&self, key: StockKey) -> AppResult<Option<StockRecord>> {
        self.store.get_stock(key).await
    }

    pub async fn list_stock(&self, filter: &StockFilter) -> AppResult<Vec<StockRecord>> {
        self.store.list_stock(filter).await
    }

    /// Ledger entries, most recent first, one page
    pub async fn list_movements(&self, query: &MovementQuery) -> AppResult<Vec<LedgerEntry>> {
        let limit = query.effective_limit(
            self.config.movements_default_limit,
            self.config.movements_max_limit,
        );
        self.store.list_movements(query, limit).await
    }

    /// One page of movements with product and location names attached
    pub async fn movement_history(&self, query: &MovementQuery) -> AppResult<Vec<MovementView>> {
        let entries = self.list_movements(query).await?;
        self.describe_movements(entries).await
    }

    async fn describe_movements(&self, entries: Vec<LedgerEntry>) -> AppResult<Vec<MovementView>> {
        let mut products: HashMap<Uuid, Option<Product>> = HashMap::new();
        let mut locations: HashMap<Uuid, Option<Location>> = HashMap::new();
        for entry in &entries {
            if !products.contains_key(&entry.product_id) {
                let product = self.store.get_product(entry.product_id).await?;
                products.insert(entry.product_id, product);
            }
            let ids = [Some(entry.location_id), entry.location_from, entry.location_to];
            for id in ids.into_iter().flatten() {
                if !locations.contains_key(&id) {
                    let location = self.store.get_location(id).await?;
                    locations.insert(id, location);
                }
            }
        }

        let location = |id: Option<Uuid>| id.and_then(|id| locations.get(&id).cloned().flatten());
        Ok(entries
            .into_iter()
            .map(|entry| {
                let product = products.get(&entry.product_id).cloned().flatten();
                let own = location(Some(entry.location_id));
                MovementView {
                    product_code: product.as_ref().map(|p| p.code.clone()),
                    product_name: product.map(|p| p.name),
                    location_code: own.as_ref().map(|l| l.code.clone()),
                    location_name: own.map(|l| l.name),
                    location_from_name: location(entry.location_from).map(|l| l.name),
                    location_to_name: location(entry.location_to).map(|l| l.name),
                    entry,
                }
            })
            .collect())
    }

    pub async fn reserve(&self, key: StockKey, qty: i64) -> AppResult<StockRecord> {
        self.reservations().reserve(key, qty).await
    }

    pub async fn release(&self, key: StockKey, qty: i64) -> AppResult<StockRecord> {
        self.reservations().release(key, qty).await
    }

    /// Compare a stock row with the sum of its ledger entries
    pub async fn audit_stock(&self, key: StockKey) -> AppResult<StockAudit> {
        let qty = self
            .store
            .get_stock(key)
            .await?
            .map_or(0, |record| record.qty);
        let totals = self.store.ledger_totals(key).await?;
        if qty != totals.qty_change {
            tracing::warn!(%key, qty, ledger_total = totals.qty_change, "Stock does not match ledger");
        }
        Ok(StockAudit {
            product_id: key.product_id,
            location_id: key.location_id,
            qty,
            ledger_total: totals.qty_change,
            entry_count: totals.entries,
            consistent: qty == totals.qty_change,
        })
    }

    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let counts = self.store.dashboard_counts().await?;
        let recent = self
            .store
            .list_movements(&MovementQuery::default(), self.config.recent_activity_limit)
            .await?;
        let recent_activity = self.describe_movements(recent).await?;
        let low_stock = self.store.low_stock(self.config.low_stock_limit).await?;
        Ok(DashboardStats {
            counts,
            recent_activity,
            low_stock,
        })
    }
}
