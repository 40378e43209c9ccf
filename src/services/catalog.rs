use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::product_variant::{self, Entity as ProductVariant},
    errors::ServiceError,
};

/// Read-only catalog lookups. Checkout re-prices every line from here so
/// client-submitted prices are never trusted.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Looks up a variant by its product and SKU, the key cart lines carry.
    #[instrument(skip(self))]
    pub async fn find_variant(
        &self,
        product_id: Uuid,
        sku: &str,
    ) -> Result<Option<product_variant::Model>, ServiceError> {
        let variant = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .filter(product_variant::Column::Sku.eq(sku))
            .one(&*self.db)
            .await?;
        Ok(variant)
    }

    /// Resolves a cart line's variant, rejecting unknown and inactive ones.
    pub async fn require_active_variant(
        &self,
        product_id: Uuid,
        sku: &str,
    ) -> Result<product_variant::Model, ServiceError> {
        let variant = self.find_variant(product_id, sku).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Product variant {} not found", sku))
        })?;

        if !variant.active {
            return Err(ServiceError::ValidationError(format!(
                "Product variant {} is not available",
                sku
            )));
        }

        Ok(variant)
    }
}
