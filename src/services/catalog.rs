use crate::entities::product;
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::instrument;

/// Authoritative pricing view of a product. Clients never supply these
/// fields; they are always resolved server-side.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub in_stock: bool,
}

impl From<product::Model> for CatalogProduct {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: model.price,
            in_stock: model.in_stock,
        }
    }
}

/// Read-only access to the product catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Bulk-fetch products for a set of ids. Unknown ids are simply
    /// absent from the result.
    async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<CatalogProduct>, ServiceError>;
}

/// sea-orm backed catalog store.
pub struct SeaOrmCatalogStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCatalogStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for SeaOrmCatalogStore {
    #[instrument(skip(self))]
    async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<CatalogProduct>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = product::Entity::find()
            .filter(product::Column::Id.is_in(ids.to_vec()))
            .all(&*self.db)
            .await?;

        Ok(rows.into_iter().map(CatalogProduct::from).collect())
    }
}
