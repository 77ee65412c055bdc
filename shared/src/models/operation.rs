//! Stock operations: receipts, deliveries, transfers and adjustments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// The four operation types that move stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Receipt,
    Delivery,
    Transfer,
    Adjustment,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Receipt,
        OperationKind::Delivery,
        OperationKind::Transfer,
        OperationKind::Adjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Receipt => "receipt",
            OperationKind::Delivery => "delivery",
            OperationKind::Transfer => "transfer",
            OperationKind::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "receipt" => Some(OperationKind::Receipt),
            "delivery" => Some(OperationKind::Delivery),
            "transfer" => Some(OperationKind::Transfer),
            "adjustment" => Some(OperationKind::Adjustment),
            _ => None,
        }
    }

    /// Status an operation of this kind lands in once its lines are applied
    pub fn applied_status(&self) -> OperationStatus {
        match self {
            OperationKind::Receipt | OperationKind::Adjustment => OperationStatus::Validated,
            OperationKind::Delivery => OperationStatus::Done,
            OperationKind::Transfer => OperationStatus::Completed,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Receipt => write!(f, "Receipt"),
            OperationKind::Delivery => write!(f, "Delivery"),
            OperationKind::Transfer => write!(f, "Transfer"),
            OperationKind::Adjustment => write!(f, "Adjustment"),
        }
    }
}

/// Lifecycle status of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Draft,
    Waiting,
    Ready,
    Validated,
    Done,
    Completed,
    Canceled,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Draft => "draft",
            OperationStatus::Waiting => "waiting",
            OperationStatus::Ready => "ready",
            OperationStatus::Validated => "validated",
            OperationStatus::Done => "done",
            OperationStatus::Completed => "completed",
            OperationStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(OperationStatus::Draft),
            "waiting" => Some(OperationStatus::Waiting),
            "ready" => Some(OperationStatus::Ready),
            "validated" => Some(OperationStatus::Validated),
            "done" => Some(OperationStatus::Done),
            "completed" => Some(OperationStatus::Completed),
            "canceled" => Some(OperationStatus::Canceled),
            _ => None,
        }
    }

    /// Not yet applied nor canceled
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            OperationStatus::Draft | OperationStatus::Waiting | OperationStatus::Ready
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Goods received into a location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ReceiptLine {
    pub product_id: Uuid,
    pub location_id: Uuid,
    #[validate(range(min = 0, max = "crate::validation::MAX_QUANTITY"))]
    pub expected_qty: i64,
    pub note: Option<String>,
}

/// Goods shipped out of a location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DeliveryLine {
    pub product_id: Uuid,
    pub location_id: Uuid,
    #[validate(range(min = 0, max = "crate::validation::MAX_QUANTITY"))]
    pub qty: i64,
    pub note: Option<String>,
}

/// Goods moved between the transfer's source and destination locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TransferLine {
    pub product_id: Uuid,
    #[validate(range(min = 0, max = "crate::validation::MAX_QUANTITY"))]
    pub qty: i64,
    pub note: Option<String>,
}

/// Physical count result; the stock row is set to exactly `counted_qty`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AdjustmentLine {
    pub product_id: Uuid,
    pub location_id: Uuid,
    #[validate(range(min = 0, max = "crate::validation::MAX_QUANTITY"))]
    pub counted_qty: i64,
    pub note: Option<String>,
}

/// Type-specific header fields and lines of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBody {
    Receipt {
        vendor_id: Option<Uuid>,
        #[serde(default)]
        lines: Vec<ReceiptLine>,
    },
    Delivery {
        customer_name: Option<String>,
        #[serde(default)]
        lines: Vec<DeliveryLine>,
    },
    Transfer {
        from_location_id: Uuid,
        to_location_id: Uuid,
        #[serde(default)]
        lines: Vec<TransferLine>,
    },
    Adjustment {
        reason: Option<String>,
        #[serde(default)]
        lines: Vec<AdjustmentLine>,
    },
}

impl OperationBody {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationBody::Receipt { .. } => OperationKind::Receipt,
            OperationBody::Delivery { .. } => OperationKind::Delivery,
            OperationBody::Transfer { .. } => OperationKind::Transfer,
            OperationBody::Adjustment { .. } => OperationKind::Adjustment,
        }
    }

    pub fn line_count(&self) -> usize {
        match self {
            OperationBody::Receipt { lines, .. } => lines.len(),
            OperationBody::Delivery { lines, .. } => lines.len(),
            OperationBody::Transfer { lines, .. } => lines.len(),
            OperationBody::Adjustment { lines, .. } => lines.len(),
        }
    }

    /// Every product referenced by a line, in line order, duplicates removed
    pub fn product_ids(&self) -> Vec<Uuid> {
        let ids: Vec<Uuid> = match self {
            OperationBody::Receipt { lines, .. } => lines.iter().map(|l| l.product_id).collect(),
            OperationBody::Delivery { lines, .. } => lines.iter().map(|l| l.product_id).collect(),
            OperationBody::Transfer { lines, .. } => lines.iter().map(|l| l.product_id).collect(),
            OperationBody::Adjustment { lines, .. } => lines.iter().map(|l| l.product_id).collect(),
        };
        dedup_in_order(ids)
    }

    /// Every location referenced by the header or a line, duplicates removed
    pub fn location_ids(&self) -> Vec<Uuid> {
        let ids: Vec<Uuid> = match self {
            OperationBody::Receipt { lines, .. } => lines.iter().map(|l| l.location_id).collect(),
            OperationBody::Delivery { lines, .. } => lines.iter().map(|l| l.location_id).collect(),
            OperationBody::Transfer {
                from_location_id,
                to_location_id,
                ..
            } => vec![*from_location_id, *to_location_id],
            OperationBody::Adjustment { lines, .. } => lines.iter().map(|l| l.location_id).collect(),
        };
        dedup_in_order(ids)
    }

    pub fn vendor_id(&self) -> Option<Uuid> {
        match self {
            OperationBody::Receipt { vendor_id, .. } => *vendor_id,
            _ => None,
        }
    }
}

fn dedup_in_order(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// A stock operation and its ordered lines.
///
/// Lines are immutable once created. The operation leaves a pending status
/// exactly once, either by validation (which applies its lines to stock) or
/// by cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub reference: String,
    pub status: OperationStatus,
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub validated_by: Option<Uuid>,
    pub validated_at: Option<DateTime<Utc>>,
    pub canceled_by: Option<Uuid>,
    pub canceled_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub body: OperationBody,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        self.body.kind()
    }
}

/// Input for creating an operation; it always starts as a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOperation {
    pub reference: String,
    pub note: Option<String>,
    #[serde(flatten)]
    pub body: OperationBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applied_status_per_kind() {
        assert_eq!(OperationKind::Receipt.applied_status(), OperationStatus::Validated);
        assert_eq!(OperationKind::Adjustment.applied_status(), OperationStatus::Validated);
        assert_eq!(OperationKind::Delivery.applied_status(), OperationStatus::Done);
        assert_eq!(OperationKind::Transfer.applied_status(), OperationStatus::Completed);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            OperationStatus::Draft,
            OperationStatus::Waiting,
            OperationStatus::Ready,
            OperationStatus::Validated,
            OperationStatus::Done,
            OperationStatus::Completed,
            OperationStatus::Canceled,
        ] {
            assert_eq!(OperationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OperationStatus::parse("archived"), None);
    }

    #[test]
    fn test_pending_statuses() {
        assert!(OperationStatus::Draft.is_pending());
        assert!(OperationStatus::Waiting.is_pending());
        assert!(OperationStatus::Ready.is_pending());
        assert!(OperationStatus::Done.is_terminal());
        assert!(OperationStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_new_operation_deserializes_tagged_body() {
        let product = Uuid::new_v4();
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        let json = serde_json::json!({
            "reference": "WH/INT/0001",
            "type": "transfer",
            "from_location_id": from,
            "to_location_id": to,
            "lines": [{ "product_id": product, "qty": 10 }]
        });

        let op: NewOperation = serde_json::from_value(json).unwrap();
        assert_eq!(op.body.kind(), OperationKind::Transfer);
        assert_eq!(op.body.line_count(), 1);
        assert_eq!(op.body.location_ids(), vec![from, to]);
        assert_eq!(op.note, None);
    }

    #[test]
    fn test_product_ids_are_deduplicated() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let loc = Uuid::new_v4();
        let body = OperationBody::Delivery {
            customer_name: None,
            lines: vec![
                DeliveryLine { product_id: p1, location_id: loc, qty: 1, note: None },
                DeliveryLine { product_id: p2, location_id: loc, qty: 1, note: None },
                DeliveryLine { product_id: p1, location_id: loc, qty: 2, note: None },
            ],
        };

        assert_eq!(body.product_ids(), vec![p1, p2]);
        assert_eq!(body.location_ids(), vec![loc]);
    }
}
