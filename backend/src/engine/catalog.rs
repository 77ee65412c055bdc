//! Thin catalog maintenance: products, locations, vendors
//!
//! Updates replace every mutable attribute, the way a `PUT` does. Codes stay
//! unique and locations stay a tree.

use std::collections::HashSet;

use chrono::Utc;
use shared::{
    validate_new_location, validate_new_product, validate_new_vendor, Location, NewLocation,
    NewProduct, NewVendor, Product, Vendor,
};
use tracing::info;
use uuid::Uuid;

use super::StockEngine;
use crate::error::{AppError, AppResult};
use crate::storage::{CatalogKind, CatalogRef, StockTx};

async fn ensure_code_free(tx: &mut dyn StockTx, kind: CatalogKind, code: &str) -> AppResult<()> {
    if tx.code_in_use(kind, code).await? {
        return Err(AppError::Conflict {
            resource: "code".to_string(),
            message: format!("{} code '{}' is already in use", kind.label(), code),
        });
    }
    Ok(())
}

/// `parent_id` must exist and must not be `id` or one of its descendants
async fn ensure_not_ancestor(tx: &mut dyn StockTx, id: Uuid, parent_id: Uuid) -> AppResult<()> {
    let mut seen = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(current) = cursor {
        if current == id {
            return Err(AppError::malformed(
                "parent_id",
                "must not be the location itself or one of its descendants",
            ));
        }
        if !seen.insert(current) {
            break;
        }
        cursor = match tx.find_location(current).await? {
            Some(location) => location.parent_id,
            None if current == parent_id => {
                return Err(AppError::NotFound(format!("Location {}", parent_id)));
            }
            None => None,
        };
    }
    Ok(())
}

impl StockEngine {
    pub async fn create_product(
        &self,
        input: NewProduct,
        created_by: Option<Uuid>,
    ) -> AppResult<Product> {
        validate_new_product(&input)?;

        let mut tx = self.store.begin().await?;
        ensure_code_free(tx.as_mut(), CatalogKind::Product, &input.code).await?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            code: input.code,
            name: input.name,
            category: input.category,
            unit_of_measure: input.unit_of_measure,
            reorder_threshold: input.reorder_threshold,
            reorder_target: input.reorder_target,
            created_by,
            updated_by: created_by,
            created_at: now,
            updated_at: now,
        };
        tx.insert_product(&product).await?;
        tx.commit().await?;

        info!(product_id = %product.id, code = %product.code, "Product created");
        Ok(product)
    }

    pub async fn update_product(
        &self,
        id: Uuid,
        input: NewProduct,
        updated_by: Option<Uuid>,
    ) -> AppResult<Product> {
        validate_new_product(&input)?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .find_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", id)))?;
        if current.code != input.code {
            ensure_code_free(tx.as_mut(), CatalogKind::Product, &input.code).await?;
        }

        let product = Product {
            code: input.code,
            name: input.name,
            category: input.category,
            unit_of_measure: input.unit_of_measure,
            reorder_threshold: input.reorder_threshold,
            reorder_target: input.reorder_target,
            updated_by,
            updated_at: Utc::now(),
            ..current
        };
        tx.update_product(&product).await?;
        tx.commit().await?;

        info!(product_id = %product.id, code = %product.code, "Product updated");
        Ok(product)
    }

    pub async fn create_location(&self, input: NewLocation) -> AppResult<Location> {
        validate_new_location(&input)?;

        let mut tx = self.store.begin().await?;
        ensure_code_free(tx.as_mut(), CatalogKind::Location, &input.code).await?;
        if let Some(parent_id) = input.parent_id {
            if tx.find_location(parent_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Location {}", parent_id)));
            }
        }

        let location = Location {
            id: Uuid::new_v4(),
            code: input.code,
            name: input.name,
            location_type: input.location_type,
            parent_id: input.parent_id,
            created_at: Utc::now(),
        };
        tx.insert_location(&location).await?;
        tx.commit().await?;

        info!(location_id = %location.id, code = %location.code, "Location created");
        Ok(location)
    }

    pub async fn update_location(&self, id: Uuid, input: NewLocation) -> AppResult<Location> {
        validate_new_location(&input)?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .find_location(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Location {}", id)))?;
        if current.code != input.code {
            ensure_code_free(tx.as_mut(), CatalogKind::Location, &input.code).await?;
        }
        if let Some(parent_id) = input.parent_id {
            ensure_not_ancestor(tx.as_mut(), id, parent_id).await?;
        }

        let location = Location {
            code: input.code,
            name: input.name,
            location_type: input.location_type,
            parent_id: input.parent_id,
            ..current
        };
        tx.update_location(&location).await?;
        tx.commit().await?;

        info!(location_id = %location.id, code = %location.code, "Location updated");
        Ok(location)
    }

    pub async fn create_vendor(&self, input: NewVendor) -> AppResult<Vendor> {
        validate_new_vendor(&input)?;

        let mut tx = self.store.begin().await?;
        ensure_code_free(tx.as_mut(), CatalogKind::Vendor, &input.code).await?;

        let vendor = Vendor {
            id: Uuid::new_v4(),
            code: input.code,
            name: input.name,
            contact_name: input.contact_name,
            email: input.email,
            phone: input.phone,
            created_at: Utc::now(),
        };
        tx.insert_vendor(&vendor).await?;
        tx.commit().await?;

        info!(vendor_id = %vendor.id, code = %vendor.code, "Vendor created");
        Ok(vendor)
    }

    pub async fn update_vendor(&self, id: Uuid, input: NewVendor) -> AppResult<Vendor> {
        validate_new_vendor(&input)?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .find_vendor(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vendor {}", id)))?;
        if current.code != input.code {
            ensure_code_free(tx.as_mut(), CatalogKind::Vendor, &input.code).await?;
        }

        let vendor = Vendor {
            code: input.code,
            name: input.name,
            contact_name: input.contact_name,
            email: input.email,
            phone: input.phone,
            ..current
        };
        tx.update_vendor(&vendor).await?;
        tx.commit().await?;

        info!(vendor_id = %vendor.id, code = %vendor.code, "Vendor updated");
        Ok(vendor)
    }

    /// Delete a catalog row nothing refers to
    pub async fn delete_catalog(&self, item: CatalogRef) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let exists = match item {
            CatalogRef::Product(id) => tx.find_product(id).await?.is_some(),
            CatalogRef::Location(id) => tx.find_location(id).await?.is_some(),
            CatalogRef::Vendor(id) => tx.find_vendor(id).await?.is_some(),
        };
        if !exists {
            return Err(AppError::NotFound(item.to_string()));
        }

        let references = tx.count_references(item).await?;
        if references > 0 {
            return Err(AppError::Conflict {
                resource: item.kind().label().to_lowercase(),
                message: format!(
                    "{} is still referenced by {} stock rows or operations",
                    item, references
                ),
            });
        }

        tx.delete_catalog(item).await?;
        tx.commit().await?;

        info!(%item, "Catalog entry deleted");
        Ok(())
    }

    pub async fn delete_product(&self, id: Uuid) -> AppResult<()> {
        self.delete_catalog(CatalogRef::Product(id)).await
    }

    pub async fn delete_location(&self, id: Uuid) -> AppResult<()> {
        self.delete_catalog(CatalogRef::Location(id)).await
    }

    pub async fn delete_vendor(&self, id: Uuid) -> AppResult<()> {
        self.delete_catalog(CatalogRef::Vendor(id)).await
    }

    pub async fn get_product(&self, id: Uuid) -> AppResult<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", id)))
    }

    pub async fn get_location(&self, id: Uuid) -> AppResult<Location> {
        self.store
            .get_location(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Location {}", id)))
    }

    pub async fn get_vendor(&self, id: Uuid) -> AppResult<Vendor> {
        self.store
            .get_vendor(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vendor {}", id)))
    }

    pub async fn list_products(&self) -> AppResult<Vec<Product>> {
        self.store.list_products().await
    }

    pub async fn list_locations(&self) -> AppResult<Vec<Location>> {
        self.store.list_locations().await
    }

    pub async fn list_vendors(&self) -> AppResult<Vec<Vendor>> {
        self.store.list_vendors().await
    }
}
