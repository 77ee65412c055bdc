//! Shared types and models for the warehouse inventory system
//!
//! This crate contains the domain types and input validation shared between
//! the stock engine, its storage backends and the HTTP layer.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
