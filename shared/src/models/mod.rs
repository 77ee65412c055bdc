//! Domain models for the warehouse inventory system

mod catalog;
mod ledger;
mod operation;
mod stock;

pub use catalog::*;
pub use ledger::*;
pub use operation::*;
pub use stock::*;
