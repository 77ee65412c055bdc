//! Reservation manager
//!
//! Earmarks on-hand stock for pending outbound work. Reservations never
//! change the on-hand quantity and write no ledger entries, but they take the
//! same row lock as validation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{validate_quantity, StockKey, StockRecord};
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::storage::InventoryStore;

/// What `release` does with a quantity larger than what is reserved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Release what is there; reserved never drops below zero
    #[default]
    Clamp,
    /// Refuse with `InvalidRelease` and change nothing
    Reject,
}

/// Reserved quantity after reserving `qty` on `record`
pub fn reserve_on(record: &StockRecord, qty: i64) -> AppResult<i64> {
    if record.available() < qty {
        return Err(AppError::InsufficientStock {
            product_id: record.product_id,
            location_id: record.location_id,
            available: record.available(),
            requested: qty,
        });
    }
    Ok(record.reserved + qty)
}

/// Reserved quantity after releasing `qty` from `record`
pub fn release_on(record: &StockRecord, qty: i64, policy: ReleasePolicy) -> AppResult<i64> {
    match policy {
        ReleasePolicy::Clamp => Ok((record.reserved - qty).max(0)),
        ReleasePolicy::Reject if qty > record.reserved => Err(AppError::InvalidRelease {
            reserved: record.reserved,
            requested: qty,
        }),
        ReleasePolicy::Reject => Ok(record.reserved - qty),
    }
}

pub struct ReservationManager<'a> {
    store: &'a dyn InventoryStore,
    policy: ReleasePolicy,
}

impl<'a> ReservationManager<'a> {
    pub fn new(store: &'a dyn InventoryStore, policy: ReleasePolicy) -> Self {
        Self { store, policy }
    }

    /// Reserve `qty` at `key`, all or nothing
    #[instrument(skip(self), fields(product_id = %key.product_id, location_id = %key.location_id))]
    pub async fn reserve(&self, key: StockKey, qty: i64) -> AppResult<StockRecord> {
        validate_quantity("qty", qty)?;

        let mut tx = self.store.begin().await?;
        let record = tx.lock_stock(key).await?.ok_or(AppError::InsufficientStock {
            product_id: key.product_id,
            location_id: key.location_id,
            available: 0,
            requested: qty,
        })?;
        let reserved = reserve_on(&record, qty)?;
        let record = tx.set_reserved(key, reserved, Utc::now()).await?;
        tx.commit().await?;

        tracing::debug!(reserved = record.reserved, "Stock reserved");
        Ok(record)
    }

    /// Release `qty` previously reserved at `key`
    #[instrument(skip(self), fields(product_id = %key.product_id, location_id = %key.location_id))]
    pub async fn release(&self, key: StockKey, qty: i64) -> AppResult<StockRecord> {
        validate_quantity("qty", qty)?;

        let mut tx = self.store.begin().await?;
        let record = tx
            .lock_stock(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stock record for {}", key)))?;
        let reserved = release_on(&record, qty, self.policy)?;
        let record = tx.set_reserved(key, reserved, Utc::now()).await?;
        tx.commit().await?;

        tracing::debug!(reserved = record.reserved, "Stock released");
        Ok(record)
    }
}
