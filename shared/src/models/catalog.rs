//! Catalog models: products, locations and vendors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A stocked product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    /// User-facing identifier code (e.g., "PRD-0001"), unique
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_of_measure: String,
    /// Per-location quantity below which the product shows up as low stock
    pub reorder_threshold: Option<i64>,
    pub reorder_target: Option<i64>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a product, or replacing the attributes of one
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub category: Option<String>,
    #[serde(default = "default_unit_of_measure")]
    #[validate(length(min = 1, max = 16))]
    pub unit_of_measure: String,
    #[validate(range(min = 0, max = "crate::validation::MAX_QUANTITY"))]
    pub reorder_threshold: Option<i64>,
    #[validate(range(min = 0, max = "crate::validation::MAX_QUANTITY"))]
    pub reorder_target: Option<i64>,
}

fn default_unit_of_measure() -> String {
    "unit".to_string()
}

/// Kind of storage location
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    #[default]
    Warehouse,
    Zone,
    Aisle,
    Section,
    Shelf,
    Bin,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Warehouse => "warehouse",
            LocationType::Zone => "zone",
            LocationType::Aisle => "aisle",
            LocationType::Section => "section",
            LocationType::Shelf => "shelf",
            LocationType::Bin => "bin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "warehouse" => Some(LocationType::Warehouse),
            "zone" => Some(LocationType::Zone),
            "aisle" => Some(LocationType::Aisle),
            "section" => Some(LocationType::Section),
            "shelf" => Some(LocationType::Shelf),
            "bin" => Some(LocationType::Bin),
            _ => None,
        }
    }
}

/// A storage location; locations form a tree through `parent_id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub location_type: LocationType,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a location, or replacing the attributes of one
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLocation {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub location_type: LocationType,
    pub parent_id: Option<Uuid>,
}

/// A supplier that receipts are booked against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vendor {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a vendor, or replacing the attributes of one
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewVendor {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
}
