//! Row-level stock access inside a unit of work

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use shared::{StockKey, StockRecord};

use super::line_processor::{RowAccess, StockEffect};
use crate::error::{AppError, AppResult};
use crate::storage::StockTx;

/// Locked rows of one unit of work; a key absent here has no stock row
pub type Snapshot = HashMap<StockKey, StockRecord>;

/// Create the row for `key` at zero if it does not exist yet, and lock it
pub async fn ensure_stock_row(
    tx: &mut dyn StockTx,
    key: StockKey,
    now: DateTime<Utc>,
) -> AppResult<StockRecord> {
    tx.ensure_stock_row(key, now).await
}

/// Lock every row in `rows`, in key order.
///
/// Locking in one global order keeps two validations that touch the same
/// rows from deadlocking each other.
pub async fn lock_rows(
    tx: &mut dyn StockTx,
    rows: &BTreeMap<StockKey, RowAccess>,
    now: DateTime<Utc>,
) -> AppResult<Snapshot> {
    let mut snapshot = Snapshot::with_capacity(rows.len());
    for (key, access) in rows {
        let record = match access {
            RowAccess::Create => Some(ensure_stock_row(tx, *key, now).await?),
            RowAccess::Existing => tx.lock_stock(*key).await?,
        };
        if let Some(record) = record {
            snapshot.insert(*key, record);
        }
    }
    Ok(snapshot)
}

/// Add `delta` to the on-hand quantity of a locked row
pub async fn apply_delta(
    tx: &mut dyn StockTx,
    key: StockKey,
    delta: i64,
    now: DateTime<Utc>,
) -> AppResult<i64> {
    let qty = tx.apply_delta(key, delta, now).await?;
    if qty < 0 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "stock for {} went negative ({})",
            key,
            qty
        )));
    }
    Ok(qty)
}

/// Write one planned effect to its stock row.
///
/// The reserved quantity only ever drops here, so it is written first to
/// keep `reserved <= qty` true after every statement.
pub async fn apply_effect(
    tx: &mut dyn StockTx,
    effect: &StockEffect,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if let Some(reserved) = effect.reserved_after {
        tx.set_reserved(effect.key, reserved, now).await?;
    }
    let qty = apply_delta(tx, effect.key, effect.qty_change, now).await?;
    if qty != effect.balance_after {
        return Err(AppError::Internal(anyhow::anyhow!(
            "stock for {} is {} after apply, planned {}",
            effect.key,
            qty,
            effect.balance_after
        )));
    }
    Ok(())
}
