//! Per-type line processing
//!
//! Each operation kind has a small adapter that turns its lines into
//! `DeltaSpec`s. One generic planner then walks the specs against the locked
//! stock rows and produces a `StockEffect` per touched location, or the first
//! `InsufficientStock` it meets. Planning writes nothing; the coordinator
//! applies the effects only once the whole plan has succeeded.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use shared::{
    AdjustmentLine, DeliveryLine, OperationBody, ReceiptLine, StockKey, StockRecord, TransferLine,
};
use uuid::Uuid;

use super::stock_store::Snapshot;
use crate::error::{AppError, AppResult};

/// How a unit of work needs a stock row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RowAccess {
    /// Lock it if it exists; an absent row means nothing on hand
    Existing,
    /// Create it at zero if absent, then lock it
    Create,
}

/// The stock change one line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaSpec {
    Add {
        key: StockKey,
        qty: i64,
        note: String,
    },
    Withdraw {
        key: StockKey,
        qty: i64,
        note: String,
    },
    Move {
        product_id: Uuid,
        from: Uuid,
        to: Uuid,
        qty: i64,
        note_out: String,
        note_in: String,
    },
    SetCount {
        key: StockKey,
        counted: i64,
        line_note: Option<String>,
    },
}

impl DeltaSpec {
    /// Rows this spec reads or writes
    pub fn rows(&self) -> Vec<(StockKey, RowAccess)> {
        match self {
            DeltaSpec::Add { key, qty, .. } if *qty > 0 => vec![(*key, RowAccess::Create)],
            DeltaSpec::Withdraw { key, qty, .. } if *qty > 0 => vec![(*key, RowAccess::Existing)],
            DeltaSpec::Move {
                product_id,
                from,
                to,
                qty,
                ..
            } if *qty > 0 => vec![
                (StockKey::new(*product_id, *from), RowAccess::Existing),
                (StockKey::new(*product_id, *to), RowAccess::Create),
            ],
            DeltaSpec::SetCount { key, .. } => vec![(*key, RowAccess::Create)],
            _ => Vec::new(),
        }
    }
}

/// One change to one stock row, and the ledger entry that records it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockEffect {
    pub key: StockKey,
    pub qty_change: i64,
    pub balance_after: i64,
    /// New reserved quantity, when the change forces it down
    pub reserved_after: Option<i64>,
    pub location_from: Option<Uuid>,
    pub location_to: Option<Uuid>,
    pub note: String,
}

/// Location codes used in transfer notes
pub type LocationLabels = HashMap<Uuid, String>;

fn label(labels: &LocationLabels, id: Uuid) -> String {
    labels.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

fn with_line_note(base: String, line_note: Option<&String>) -> String {
    match line_note.map(|n| n.trim()).filter(|n| !n.is_empty()) {
        Some(note) => format!("{} - {}", base, note),
        None => base,
    }
}

fn receipt_specs(lines: &[ReceiptLine]) -> Vec<DeltaSpec> {
    lines
        .iter()
        .map(|line| DeltaSpec::Add {
            key: StockKey::new(line.product_id, line.location_id),
            qty: line.expected_qty,
            note: with_line_note("Receipt validation".to_string(), line.note.as_ref()),
        })
        .collect()
}

fn delivery_specs(lines: &[DeliveryLine]) -> Vec<DeltaSpec> {
    lines
        .iter()
        .map(|line| DeltaSpec::Withdraw {
            key: StockKey::new(line.product_id, line.location_id),
            qty: line.qty,
            note: with_line_note("Delivery validation".to_string(), line.note.as_ref()),
        })
        .collect()
}

fn transfer_specs(
    from: Uuid,
    to: Uuid,
    lines: &[TransferLine],
    labels: &LocationLabels,
) -> Vec<DeltaSpec> {
    let to_label = label(labels, to);
    let from_label = label(labels, from);
    lines
        .iter()
        .map(|line| DeltaSpec::Move {
            product_id: line.product_id,
            from,
            to,
            qty: line.qty,
            note_out: with_line_note(format!("Transfer to {}", to_label), line.note.as_ref()),
            note_in: with_line_note(format!("Transfer from {}", from_label), line.note.as_ref()),
        })
        .collect()
}

fn adjustment_specs(lines: &[AdjustmentLine]) -> Vec<DeltaSpec> {
    lines
        .iter()
        .map(|line| DeltaSpec::SetCount {
            key: StockKey::new(line.product_id, line.location_id),
            counted: line.counted_qty,
            line_note: line.note.clone(),
        })
        .collect()
}

/// Turn the lines of an operation into delta specs, in line order
pub fn delta_specs(body: &OperationBody, labels: &LocationLabels) -> Vec<DeltaSpec> {
    match body {
        OperationBody::Receipt { lines, .. } => receipt_specs(lines),
        OperationBody::Delivery { lines, .. } => delivery_specs(lines),
        OperationBody::Transfer {
            from_location_id,
            to_location_id,
            lines,
        } => transfer_specs(*from_location_id, *to_location_id, lines, labels),
        OperationBody::Adjustment { lines, .. } => adjustment_specs(lines),
    }
}

/// Every row the specs touch; a row needed both ways is created
pub fn row_access(specs: &[DeltaSpec]) -> BTreeMap<StockKey, RowAccess> {
    let mut rows = BTreeMap::new();
    for (key, access) in specs.iter().flat_map(DeltaSpec::rows) {
        rows.entry(key)
            .and_modify(|current: &mut RowAccess| *current = (*current).max(access))
            .or_insert(access);
    }
    rows
}

fn locked_row(snapshot: &mut Snapshot, key: StockKey) -> AppResult<&mut StockRecord> {
    snapshot.get_mut(&key).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("stock row for {} was not locked", key))
    })
}

fn take(snapshot: &mut Snapshot, key: StockKey, qty: i64) -> AppResult<&mut StockRecord> {
    let available = snapshot.get(&key).map_or(0, StockRecord::available);
    if available < qty {
        return Err(AppError::InsufficientStock {
            product_id: key.product_id,
            location_id: key.location_id,
            available,
            requested: qty,
        });
    }
    let row = locked_row(snapshot, key)?;
    row.qty -= qty;
    Ok(row)
}

fn put(snapshot: &mut Snapshot, key: StockKey, qty: i64) -> AppResult<&mut StockRecord> {
    let row = locked_row(snapshot, key)?;
    row.qty = row
        .qty
        .checked_add(qty)
        .ok_or(AppError::QuantityOverflow {
            product_id: key.product_id,
            location_id: key.location_id,
        })?;
    Ok(row)
}

/// Plan every spec against the running snapshot.
///
/// `snapshot` ends up holding the post-operation state of every touched
/// row. Withdrawals only draw on unreserved stock, and lines hitting the same
/// row see the effects of the lines before them.
pub fn plan(
    specs: &[DeltaSpec],
    snapshot: &mut Snapshot,
    now: DateTime<Utc>,
    record_zero_adjustments: bool,
) -> AppResult<Vec<StockEffect>> {
    let mut effects = Vec::with_capacity(specs.len());

    for spec in specs {
        match spec {
            DeltaSpec::Add { qty: 0, .. }
            | DeltaSpec::Withdraw { qty: 0, .. }
            | DeltaSpec::Move { qty: 0, .. } => {}
            DeltaSpec::Add { key, qty, note } => {
                let row = put(snapshot, *key, *qty)?;
                row.updated_at = now;
                effects.push(StockEffect {
                    key: *key,
                    qty_change: *qty,
                    balance_after: row.qty,
                    reserved_after: None,
                    location_from: None,
                    location_to: Some(key.location_id),
                    note: note.clone(),
                });
            }
            DeltaSpec::Withdraw { key, qty, note } => {
                let row = take(snapshot, *key, *qty)?;
                row.updated_at = now;
                effects.push(StockEffect {
                    key: *key,
                    qty_change: -qty,
                    balance_after: row.qty,
                    reserved_after: None,
                    location_from: Some(key.location_id),
                    location_to: None,
                    note: note.clone(),
                });
            }
            DeltaSpec::Move {
                product_id,
                from,
                to,
                qty,
                note_out,
                note_in,
            } => {
                let source = StockKey::new(*product_id, *from);
                let destination = StockKey::new(*product_id, *to);

                let row = take(snapshot, source, *qty)?;
                row.updated_at = now;
                effects.push(StockEffect {
                    key: source,
                    qty_change: -qty,
                    balance_after: row.qty,
                    reserved_after: None,
                    location_from: Some(*from),
                    location_to: Some(*to),
                    note: note_out.clone(),
                });

                let row = put(snapshot, destination, *qty)?;
                row.updated_at = now;
                effects.push(StockEffect {
                    key: destination,
                    qty_change: *qty,
                    balance_after: row.qty,
                    reserved_after: None,
                    location_from: Some(*from),
                    location_to: Some(*to),
                    note: note_in.clone(),
                });
            }
            DeltaSpec::SetCount {
                key,
                counted,
                line_note,
            } => {
                let row = locked_row(snapshot, *key)?;
                let delta = counted - row.qty;
                if delta == 0 && !record_zero_adjustments {
                    continue;
                }

                row.qty = *counted;
                let reserved_after = (row.reserved > *counted).then_some(*counted);
                if let Some(reserved) = reserved_after {
                    row.reserved = reserved;
                }
                row.updated_at = now;

                let direction = match delta.signum() {
                    1 => "increase",
                    -1 => "decrease",
                    _ => "no change",
                };
                effects.push(StockEffect {
                    key: *key,
                    qty_change: delta,
                    balance_after: row.qty,
                    reserved_after,
                    location_from: Some(key.location_id),
                    location_to: Some(key.location_id),
                    note: with_line_note(
                        format!("Stock adjustment: {}", direction),
                        line_note.as_ref(),
                    ),
                });
            }
        }
    }

    Ok(effects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: StockKey, qty: i64, reserved: i64) -> StockRecord {
        StockRecord {
            qty,
            reserved,
            ..StockRecord::empty(key, Utc::now())
        }
    }

    fn key() -> StockKey {
        StockKey::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_receipt_adds_expected_qty() {
        let key = key();
        let specs = receipt_specs(&[ReceiptLine {
            product_id: key.product_id,
            location_id: key.location_id,
            expected_qty: 20,
            note: None,
        }]);
        let mut snapshot = Snapshot::from([(key, record(key, 0, 0))]);

        let effects = plan(&specs, &mut snapshot, Utc::now(), true).unwrap();

        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].qty_change, 20);
        assert_eq!(effects[0].balance_after, 20);
        assert_eq!(effects[0].location_to, Some(key.location_id));
        assert_eq!(effects[0].note, "Receipt validation");
    }

    #[test]
    fn test_withdraw_respects_reserved() {
        let key = key();
        let specs = vec![DeltaSpec::Withdraw {
            key,
            qty: 10,
            note: "Delivery validation".to_string(),
        }];
        let mut snapshot = Snapshot::from([(key, record(key, 12, 5))]);

        let err = plan(&specs, &mut snapshot, Utc::now(), true).unwrap_err();
        match err {
            AppError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 7);
                assert_eq!(requested, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_withdraw_from_absent_row_has_nothing_available() {
        let key = key();
        let specs = vec![DeltaSpec::Withdraw {
            key,
            qty: 1,
            note: String::new(),
        }];
        let mut snapshot = Snapshot::new();

        assert!(matches!(
            plan(&specs, &mut snapshot, Utc::now(), true),
            Err(AppError::InsufficientStock { available: 0, requested: 1, .. })
        ));
    }

    #[test]
    fn test_lines_on_same_row_accumulate() {
        let key = key();
        let withdraw = |qty| DeltaSpec::Withdraw {
            key,
            qty,
            note: String::new(),
        };
        let mut snapshot = Snapshot::from([(key, record(key, 10, 0))]);

        let err = plan(&[withdraw(6), withdraw(6)], &mut snapshot, Utc::now(), true).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { available: 4, .. }));
    }

    #[test]
    fn test_transfer_emits_two_opposite_effects() {
        let product = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let labels = LocationLabels::from([(a, "WH-A".to_string()), (b, "WH-B".to_string())]);
        let specs = transfer_specs(
            a,
            b,
            &[TransferLine {
                product_id: product,
                qty: 10,
                note: None,
            }],
            &labels,
        );
        let source = StockKey::new(product, a);
        let destination = StockKey::new(product, b);
        let mut snapshot = Snapshot::from([
            (source, record(source, 15, 0)),
            (destination, record(destination, 0, 0)),
        ]);

        let effects = plan(&specs, &mut snapshot, Utc::now(), true).unwrap();

        assert_eq!(effects.len(), 2);
        assert_eq!((effects[0].qty_change, effects[0].balance_after), (-10, 5));
        assert_eq!((effects[1].qty_change, effects[1].balance_after), (10, 10));
        assert_eq!(effects[0].note, "Transfer to WH-B");
        assert_eq!(effects[1].note, "Transfer from WH-A");
    }

    #[test]
    fn test_adjustment_decrease_and_reserved_clamp() {
        let key = key();
        let specs = adjustment_specs(&[AdjustmentLine {
            product_id: key.product_id,
            location_id: key.location_id,
            counted_qty: 8,
            note: Some("cycle count".to_string()),
        }]);
        let mut snapshot = Snapshot::from([(key, record(key, 12, 10))]);

        let effects = plan(&specs, &mut snapshot, Utc::now(), true).unwrap();

        assert_eq!(effects[0].qty_change, -4);
        assert_eq!(effects[0].balance_after, 8);
        assert_eq!(effects[0].reserved_after, Some(8));
        assert_eq!(effects[0].note, "Stock adjustment: decrease - cycle count");
        assert_eq!(effects[0].location_from, Some(key.location_id));
        assert_eq!(effects[0].location_to, Some(key.location_id));
    }

    #[test]
    fn test_zero_adjustment_follows_policy() {
        let key = key();
        let specs = vec![DeltaSpec::SetCount {
            key,
            counted: 5,
            line_note: None,
        }];

        let mut snapshot = Snapshot::from([(key, record(key, 5, 0))]);
        let recorded = plan(&specs, &mut snapshot, Utc::now(), true).unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].qty_change, 0);
        assert_eq!(recorded[0].note, "Stock adjustment: no change");

        let mut snapshot = Snapshot::from([(key, record(key, 5, 0))]);
        assert!(plan(&specs, &mut snapshot, Utc::now(), false).unwrap().is_empty());
    }

    #[test]
    fn test_add_past_i64_is_overflow() {
        let key = key();
        let add = |qty| DeltaSpec::Add {
            key,
            qty,
            note: String::new(),
        };
        let mut snapshot = Snapshot::from([(key, record(key, 0, 0))]);

        let err = plan(&[add(i64::MAX), add(i64::MAX)], &mut snapshot, Utc::now(), true)
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::QuantityOverflow { product_id, location_id }
                if product_id == key.product_id && location_id == key.location_id
        ));
    }

    #[test]
    fn test_transfer_into_full_row_is_overflow() {
        let product = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let source = StockKey::new(product, a);
        let destination = StockKey::new(product, b);
        let specs = vec![DeltaSpec::Move {
            product_id: product,
            from: a,
            to: b,
            qty: i64::MAX,
            note_out: String::new(),
            note_in: String::new(),
        }];
        let mut snapshot = Snapshot::from([
            (source, record(source, i64::MAX, 0)),
            (destination, record(destination, 1, 0)),
        ]);

        assert!(matches!(
            plan(&specs, &mut snapshot, Utc::now(), true),
            Err(AppError::QuantityOverflow { location_id, .. }) if location_id == b
        ));
    }

    #[test]
    fn test_row_access_prefers_create() {
        let product = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let specs = vec![DeltaSpec::Move {
            product_id: product,
            from: a,
            to: b,
            qty: 3,
            note_out: String::new(),
            note_in: String::new(),
        }];

        let rows = row_access(&specs);
        assert_eq!(rows[&StockKey::new(product, a)], RowAccess::Existing);
        assert_eq!(rows[&StockKey::new(product, b)], RowAccess::Create);
    }
}
