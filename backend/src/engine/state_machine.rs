//! Operation lifecycle
//!
//! ```text
//! draft ──validate──> validated (receipt, adjustment)
//!                     done      (delivery)
//!                     completed (transfer)
//! draft | waiting | ready ──cancel──> canceled
//! ```
//!
//! Nothing leaves a terminal status.

use chrono::{DateTime, Utc};
use shared::{Operation, OperationKind, OperationStatus};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// An operation fetched by id must also be of the kind the caller asked for
pub fn ensure_kind(operation: &Operation, kind: OperationKind) -> AppResult<()> {
    if operation.kind() != kind {
        return Err(AppError::NotFound(format!("{} {}", kind, operation.id)));
    }
    Ok(())
}

/// Preconditions of validation, checked before any stock is touched
pub fn check_validatable(operation: &Operation) -> AppResult<()> {
    if operation.status != OperationStatus::Draft {
        return Err(AppError::InvalidState(format!(
            "{} {} is {}; only draft operations can be validated",
            operation.kind(),
            operation.reference,
            operation.status
        )));
    }
    if operation.body.line_count() == 0 {
        return Err(AppError::EmptyOperation);
    }
    Ok(())
}

pub fn check_cancelable(operation: &Operation) -> AppResult<()> {
    if !operation.status.is_pending() {
        return Err(AppError::InvalidState(format!(
            "{} {} is already {}",
            operation.kind(),
            operation.reference,
            operation.status
        )));
    }
    Ok(())
}

/// Move a validated operation to its kind's applied status
pub fn mark_applied(operation: &mut Operation, user_id: Uuid, now: DateTime<Utc>) {
    operation.status = operation.kind().applied_status();
    operation.validated_by = Some(user_id);
    operation.validated_at = Some(now);
}

pub fn mark_canceled(operation: &mut Operation, user_id: Uuid, now: DateTime<Utc>) {
    operation.status = OperationStatus::Canceled;
    operation.canceled_by = Some(user_id);
    operation.canceled_at = Some(now);
}
