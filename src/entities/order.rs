use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A paid order, created exactly once per checkout session and never
/// mutated afterwards. `stripe_session_id` carries a unique index and is
/// the idempotency key for reconciliation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub stripe_session_id: String,

    /// Authenticated owner of the order
    pub user_id: Uuid,

    pub customer_email: String,
    pub customer_name: Option<String>,

    /// Denormalized line items: `[{product_name, quantity, price}]`
    pub items: Json,

    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,

    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
