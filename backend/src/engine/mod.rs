//! Stock ledger and operation validation engine
//!
//! `StockEngine` is the only entry point collaborators use. Validation is
//! the single path that mutates on-hand quantities; reservations move the
//! reserved quantity only.

use std::sync::Arc;

use crate::storage::{InventoryStore, MemoryStore};

mod catalog;
pub mod coordinator;
pub mod ledger;
pub mod line_processor;
mod operations;
mod queries;
pub mod reservation;
pub mod state_machine;
pub mod stock_store;

pub use coordinator::ValidationOutcome;
pub use reservation::{ReleasePolicy, ReservationManager};

/// Engine policies and page sizes
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub release_policy: ReleasePolicy,
    pub record_zero_adjustments: bool,
    pub movements_default_limit: u32,
    pub movements_max_limit: u32,
    pub recent_activity_limit: u32,
    pub low_stock_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            release_policy: ReleasePolicy::Clamp,
            record_zero_adjustments: true,
            movements_default_limit: 100,
            movements_max_limit: 1000,
            recent_activity_limit: 10,
            low_stock_limit: 10,
        }
    }
}

/// Facade over the stock engine; cheap to clone
#[derive(Clone)]
pub struct StockEngine {
    store: Arc<dyn InventoryStore>,
    config: EngineConfig,
}

impl StockEngine {
    pub fn new(store: Arc<dyn InventoryStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Engine over a fresh in-memory store
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn InventoryStore {
        self.store.as_ref()
    }

    pub fn reservations(&self) -> ReservationManager<'_> {
        ReservationManager::new(self.store.as_ref(), self.config.release_policy)
    }
}
