//! Operation lifecycle entry points of the engine

use chrono::Utc;
use shared::{
    validate_new_operation, NewOperation, Operation, OperationKind, OperationStatus,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{coordinator, state_machine, StockEngine, ValidationOutcome};
use crate::error::{AppError, AppResult};

impl StockEngine {
    /// Create a draft operation after checking its input and every reference
    #[instrument(skip(self, input), fields(kind = %input.body.kind(), reference = %input.reference))]
    pub async fn create_operation(
        &self,
        input: NewOperation,
        created_by: Uuid,
    ) -> AppResult<Operation> {
        validate_new_operation(&input)?;

        let mut tx = self.store.begin().await?;
        for product_id in input.body.product_ids() {
            if tx.find_product(product_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Product {}", product_id)));
            }
        }
        for location_id in input.body.location_ids() {
            if tx.find_location(location_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Location {}", location_id)));
            }
        }
        if let Some(vendor_id) = input.body.vendor_id() {
            if tx.find_vendor(vendor_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Vendor {}", vendor_id)));
            }
        }

        let operation = Operation {
            id: Uuid::new_v4(),
            reference: input.reference.trim().to_string(),
            status: OperationStatus::Draft,
            note: input.note,
            created_by,
            created_at: Utc::now(),
            validated_by: None,
            validated_at: None,
            canceled_by: None,
            canceled_at: None,
            body: input.body,
        };
        tx.insert_operation(&operation).await?;
        tx.commit().await?;

        info!(operation_id = %operation.id, lines = operation.body.line_count(), "Operation created");
        Ok(operation)
    }

    /// Apply a draft operation to stock; see [`coordinator::validate_operation`]
    pub async fn validate_operation(
        &self,
        kind: OperationKind,
        operation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<ValidationOutcome> {
        coordinator::validate_operation(
            self.store.as_ref(),
            &self.config,
            kind,
            operation_id,
            user_id,
        )
        .await
    }

    /// Cancel a pending operation; stock is not touched
    #[instrument(skip(self))]
    pub async fn cancel_operation(
        &self,
        kind: OperationKind,
        operation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Operation> {
        let mut tx = self.store.begin().await?;
        let mut operation = tx
            .lock_operation(operation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind, operation_id)))?;
        state_machine::ensure_kind(&operation, kind)?;
        state_machine::check_cancelable(&operation)?;

        state_machine::mark_canceled(&mut operation, user_id, Utc::now());
        tx.update_operation_status(&operation).await?;
        tx.commit().await?;

        info!(reference = %operation.reference, "Operation canceled");
        Ok(operation)
    }

    pub async fn get_operation(&self, kind: OperationKind, operation_id: Uuid) -> AppResult<Operation> {
        let operation = self
            .store
            .get_operation(operation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind, operation_id)))?;
        state_machine::ensure_kind(&operation, kind)?;
        Ok(operation)
    }

    pub async fn list_operations(
        &self,
        kind: OperationKind,
        status: Option<OperationStatus>,
    ) -> AppResult<Vec<Operation>> {
        self.store.list_operations(kind, status).await
    }
}
