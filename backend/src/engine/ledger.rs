//! Ledger appender
//!
//! The ledger records what the line processor computed and nothing else.

use chrono::{DateTime, Utc};
use shared::{LedgerEntry, NewLedgerEntry, Operation};
use uuid::Uuid;

use super::line_processor::StockEffect;
use crate::error::AppResult;
use crate::storage::StockTx;

/// The entry recording `effect` as part of `operation`
pub fn entry_for(
    effect: &StockEffect,
    operation: &Operation,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> NewLedgerEntry {
    NewLedgerEntry {
        product_id: effect.key.product_id,
        location_id: effect.key.location_id,
        kind: operation.kind(),
        operation_id: operation.id,
        location_from: effect.location_from,
        location_to: effect.location_to,
        qty_change: effect.qty_change,
        balance_after: effect.balance_after,
        note: Some(effect.note.clone()),
        user_id,
        timestamp: now,
    }
}

pub async fn append(tx: &mut dyn StockTx, entry: NewLedgerEntry) -> AppResult<LedgerEntry> {
    tx.append_ledger(entry).await
}

/// On-hand quantity implied by a run of entries
pub fn fold_balance<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> i64 {
    entries.into_iter().map(|e| e.qty_change).sum()
}
