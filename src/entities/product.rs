use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Catalog product. Rows are owned by catalog management; this service
/// only ever reads them.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Primary key; ids are assigned by the catalog, not auto-incremented
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Product name must be between 1 and 255 characters"
    ))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    /// Unit price in USD; authoritative over anything a client submits
    pub price: Decimal,

    /// Sales unit shown in the storefront (e.g. "lb", "dozen", "bunch")
    pub unit: Option<String>,

    pub category: Option<String>,

    /// Farm the product is sourced from
    pub farm_name: Option<String>,

    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,

    pub organic: bool,

    /// Out-of-stock products are silently dropped from carts
    pub in_stock: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
