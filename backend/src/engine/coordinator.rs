//! Transaction coordinator
//!
//! Runs one validation as one unit of work. Every early return drops the
//! unit of work uncommitted, which discards whatever it had written, so a
//! failed validation leaves stock, ledger and operation exactly as they were.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{validate_body, OperationBody, OperationKind, OperationStatus, StockRecord};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::line_processor::{self, LocationLabels};
use super::{ledger, state_machine, stock_store, EngineConfig};
use crate::error::{AppError, AppResult};
use crate::storage::{InventoryStore, StockTx};

/// What a successful validation changed
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub validated_at: DateTime<Utc>,
    /// Final state of every touched stock row, in first-touch order
    pub balances: Vec<StockRecord>,
    pub ledger_entry_ids: Vec<Uuid>,
}

async fn location_labels(tx: &mut dyn StockTx, body: &OperationBody) -> AppResult<LocationLabels> {
    let mut labels = LocationLabels::new();
    if let OperationBody::Transfer {
        from_location_id,
        to_location_id,
        ..
    } = body
    {
        for id in [*from_location_id, *to_location_id] {
            if let Some(location) = tx.find_location(id).await? {
                labels.insert(id, location.code);
            }
        }
    }
    Ok(labels)
}

/// Apply every line of a draft operation to stock and the ledger, atomically
#[instrument(
    skip(store, config),
    fields(kind = %kind, operation_id = %operation_id, user_id = %user_id)
)]
pub async fn validate_operation(
    store: &dyn InventoryStore,
    config: &EngineConfig,
    kind: OperationKind,
    operation_id: Uuid,
    user_id: Uuid,
) -> AppResult<ValidationOutcome> {
    let mut tx = store.begin().await?;

    let mut operation = tx
        .lock_operation(operation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", kind, operation_id)))?;
    state_machine::ensure_kind(&operation, kind)?;
    state_machine::check_validatable(&operation)?;
    validate_body(&operation.body)?;

    let labels = location_labels(tx.as_mut(), &operation.body).await?;
    let specs = line_processor::delta_specs(&operation.body, &labels);
    let rows = line_processor::row_access(&specs);

    let now = Utc::now();
    let mut snapshot = stock_store::lock_rows(tx.as_mut(), &rows, now).await?;

    // Pre-flight: the whole plan must succeed before anything is written
    let effects = match line_processor::plan(
        &specs,
        &mut snapshot,
        now,
        config.record_zero_adjustments,
    ) {
        Ok(effects) => effects,
        Err(err) => {
            debug!(error = %err, "Pre-flight rejected operation");
            return Err(err);
        }
    };
    debug!(effects = effects.len(), rows = rows.len(), "Pre-flight passed");

    let mut ledger_entry_ids = Vec::with_capacity(effects.len());
    let mut touched = Vec::new();
    for effect in &effects {
        stock_store::apply_effect(tx.as_mut(), effect, now).await?;
        let entry = ledger::append(
            tx.as_mut(),
            ledger::entry_for(effect, &operation, user_id, now),
        )
        .await?;
        ledger_entry_ids.push(entry.id);
        if !touched.contains(&effect.key) {
            touched.push(effect.key);
        }
    }

    state_machine::mark_applied(&mut operation, user_id, now);
    tx.update_operation_status(&operation).await?;
    tx.commit().await?;

    let balances = touched
        .iter()
        .filter_map(|key| snapshot.get(key).cloned())
        .collect();

    info!(
        reference = %operation.reference,
        status = %operation.status,
        entries = ledger_entry_ids.len(),
        "Operation validated"
    );

    Ok(ValidationOutcome {
        operation_id: operation.id,
        kind: operation.kind(),
        status: operation.status,
        validated_at: now,
        balances,
        ledger_entry_ids,
    })
}
