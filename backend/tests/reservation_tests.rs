//! Reservation tests
//!
//! Reserve and release against a stock row, and how reservations interact
//! with validation.

mod common;

use common::{adjustment, delivery, Fixture};
use proptest::prelude::*;
use shared::{OperationKind, StockKey, StockRecord};
use uuid::Uuid;
use wims_backend::engine::reservation::{release_on, reserve_on, ReleasePolicy};
use wims_backend::{AppError, EngineConfig};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_reduces_availability_only() {
        let fx = Fixture::new();
        let p = fx.product("P1").await;
        let l = fx.location("L1").await;
        fx.receive(p.id, l.id, 10).await;

        let record = fx.engine.reserve(StockKey::new(p.id, l.id), 4).await.unwrap();

        assert_eq!(record.qty, 10);
        assert_eq!(record.reserved, 4);
        assert_eq!(record.available(), 6);
        // Reservations write no ledger entries
        let audit = fx.engine.audit_stock(StockKey::new(p.id, l.id)).await.unwrap();
        assert_eq!(audit.entry_count, 1);
    }

    #[tokio::test]
    async fn test_reserve_beyond_available_changes_nothing() {
        let fx = Fixture::new();
        let p = fx.product("P1").await;
        let l = fx.location("L1").await;
        fx.receive(p.id, l.id, 10).await;
        let key = StockKey::new(p.id, l.id);
        fx.engine.reserve(key, 7).await.unwrap();

        let err = fx.engine.reserve(key, 4).await.unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock { available: 3, requested: 4, .. }));
        assert_eq!(fx.reserved(p.id, l.id).await, 7);
    }

    #[tokio::test]
    async fn test_reserve_without_row() {
        let fx = Fixture::new();
        let key = StockKey::new(Uuid::new_v4(), Uuid::new_v4());

        let err = fx.engine.reserve(key, 1).await.unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock { available: 0, .. }));
        assert!(fx.engine.get_stock(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_quantity_is_malformed() {
        let fx = Fixture::new();
        let p = fx.product("P1").await;
        let l = fx.location("L1").await;
        fx.receive(p.id, l.id, 10).await;
        let key = StockKey::new(p.id, l.id);

        assert!(matches!(
            fx.engine.reserve(key, -1).await,
            Err(AppError::MalformedInput { .. })
        ));
        assert!(matches!(
            fx.engine.release(key, -1).await,
            Err(AppError::MalformedInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_clamps_by_default() {
        let fx = Fixture::new();
        let p = fx.product("P1").await;
        let l = fx.location("L1").await;
        fx.receive(p.id, l.id, 10).await;
        let key = StockKey::new(p.id, l.id);
        fx.engine.reserve(key, 3).await.unwrap();

        let record = fx.engine.release(key, 5).await.unwrap();

        assert_eq!(record.reserved, 0);
        assert_eq!(record.qty, 10);
    }

    #[tokio::test]
    async fn test_release_rejects_under_strict_policy() {
        let fx = Fixture::with_config(EngineConfig {
            release_policy: ReleasePolicy::Reject,
            ..EngineConfig::default()
        });
        let p = fx.product("P1").await;
        let l = fx.location("L1").await;
        fx.receive(p.id, l.id, 10).await;
        let key = StockKey::new(p.id, l.id);
        fx.engine.reserve(key, 3).await.unwrap();

        let err = fx.engine.release(key, 5).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRelease { reserved: 3, requested: 5 }));
        assert_eq!(fx.reserved(p.id, l.id).await, 3);

        let record = fx.engine.release(key, 3).await.unwrap();
        assert_eq!(record.reserved, 0);
    }

    /// A counted-to-zero row has nothing reserved; releasing from it is a no-op or an error
    #[tokio::test]
    async fn test_release_on_empty_row() {
        let fx = Fixture::new();
        let p = fx.product("P1").await;
        let l = fx.location("L1").await;
        let op = fx.draft("WH/ADJ/0001", adjustment(vec![(p.id, l.id, 0)])).await;
        fx.engine
            .validate_operation(OperationKind::Adjustment, op.id, fx.user)
            .await
            .unwrap();
        let key = StockKey::new(p.id, l.id);

        let record = fx.engine.release(key, 3).await.unwrap();
        assert_eq!((record.qty, record.reserved), (0, 0));

        assert!(matches!(
            release_on(&record, 3, ReleasePolicy::Reject),
            Err(AppError::InvalidRelease { reserved: 0, requested: 3 })
        ));
    }

    #[tokio::test]
    async fn test_release_without_row_is_not_found() {
        let fx = Fixture::new();
        let key = StockKey::new(Uuid::new_v4(), Uuid::new_v4());

        assert!(matches!(
            fx.engine.release(key, 1).await,
            Err(AppError::NotFound(_))
        ));
    }

    /// Once released, reserved stock can be delivered again
    #[tokio::test]
    async fn test_release_frees_stock_for_delivery() {
        let fx = Fixture::new();
        let p = fx.product("P1").await;
        let l = fx.location("L1").await;
        fx.receive(p.id, l.id, 10).await;
        let key = StockKey::new(p.id, l.id);
        fx.engine.reserve(key, 10).await.unwrap();

        let op = fx.draft("WH/OUT/0001", delivery(vec![(p.id, l.id, 6)])).await;
        assert!(fx
            .engine
            .validate_operation(OperationKind::Delivery, op.id, fx.user)
            .await
            .is_err());

        fx.engine.release(key, 6).await.unwrap();
        fx.engine
            .validate_operation(OperationKind::Delivery, op.id, fx.user)
            .await
            .unwrap();

        assert_eq!(fx.qty(p.id, l.id).await, 4);
        assert_eq!(fx.reserved(p.id, l.id).await, 4);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::Utc;

    fn record(qty: i64, reserved: i64) -> StockRecord {
        let mut record = StockRecord::empty(StockKey::new(Uuid::new_v4(), Uuid::new_v4()), Utc::now());
        record.qty = qty;
        record.reserved = reserved;
        record
    }

    fn row() -> impl Strategy<Value = (i64, i64)> {
        (0i64..10_000).prop_flat_map(|qty| (Just(qty), 0..=qty))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Reserving never pushes reserved above on-hand
        #[test]
        fn prop_reserve_stays_within_qty((qty, reserved) in row(), request in 0i64..20_000) {
            let r = record(qty, reserved);
            match reserve_on(&r, request) {
                Ok(after) => {
                    prop_assert!(after <= qty);
                    prop_assert_eq!(after, reserved + request);
                }
                Err(AppError::InsufficientStock { available, .. }) => {
                    prop_assert!(request > qty - reserved);
                    prop_assert_eq!(available, qty - reserved);
                }
                Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
            }
        }

        /// Clamped release never goes negative and never raises reserved
        #[test]
        fn prop_clamped_release_bounds((qty, reserved) in row(), request in 0i64..20_000) {
            let r = record(qty, reserved);
            let after = release_on(&r, request, ReleasePolicy::Clamp).unwrap();
            prop_assert!(after >= 0);
            prop_assert!(after <= reserved);
        }

        /// Strict release succeeds exactly when the request fits
        #[test]
        fn prop_strict_release_all_or_nothing((qty, reserved) in row(), request in 0i64..20_000) {
            let r = record(qty, reserved);
            let result = release_on(&r, request, ReleasePolicy::Reject);
            prop_assert_eq!(result.is_ok(), request <= reserved);
        }
    }
}
