use crate::auth::AuthenticatedUser;
use crate::entities::order;
use crate::errors::ServiceError;
use crate::services::stripe::{PaymentProvider, PaymentStatus, RetrievedSession};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect,
    TryInsertResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Denormalized order line persisted inside the order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_name: String,
    pub quantity: i64,
    /// Line total in USD
    pub price: Decimal,
}

/// A fully derived order, ready to persist.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub stripe_session_id: String,
    pub user_id: Uuid,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub items: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Result of an insert attempt against the unique session-id index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(Uuid),
    /// Another writer got there first; this is the surviving order's id
    AlreadyExists(Uuid),
}

/// Order persistence seam.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_id_by_session(&self, session_id: &str) -> Result<Option<Uuid>, ServiceError>;

    /// Insert if no order exists for the session id yet. Must be atomic
    /// with respect to concurrent reconcilers: losers observe the
    /// winner's row instead of a constraint error.
    async fn insert(&self, order: NewOrder) -> Result<InsertOutcome, ServiceError>;
}

/// sea-orm backed order store. Relies on the unique index on
/// `stripe_session_id` and insert-on-conflict-do-nothing.
pub struct SeaOrmOrderStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOrderStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn existing_id(&self, session_id: &str) -> Result<Option<Uuid>, ServiceError> {
        let id = order::Entity::find()
            .select_only()
            .column(order::Column::Id)
            .filter(order::Column::StripeSessionId.eq(session_id))
            .into_tuple::<Uuid>()
            .one(&*self.db)
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl OrderStore for SeaOrmOrderStore {
    #[instrument(skip(self))]
    async fn find_id_by_session(&self, session_id: &str) -> Result<Option<Uuid>, ServiceError> {
        self.existing_id(session_id).await
    }

    #[instrument(skip(self, new_order), fields(session_id = %new_order.stripe_session_id))]
    async fn insert(&self, new_order: NewOrder) -> Result<InsertOutcome, ServiceError> {
        let session_id = new_order.stripe_session_id.clone();

        let items = serde_json::to_value(&new_order.items)
            .map_err(|e| ServiceError::InternalError(format!("Order items encoding: {}", e)))?;

        let active = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            stripe_session_id: Set(new_order.stripe_session_id),
            user_id: Set(new_order.user_id),
            customer_email: Set(new_order.customer_email),
            customer_name: Set(new_order.customer_name),
            items: Set(items),
            subtotal: Set(new_order.subtotal),
            tax: Set(new_order.tax),
            total: Set(new_order.total),
            status: Set("paid".to_string()),
            created_at: Set(Utc::now()),
        };

        let result = order::Entity::insert(active)
            .on_conflict(
                OnConflict::column(order::Column::StripeSessionId)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&*self.db)
            .await?;

        match result {
            TryInsertResult::Inserted(res) => Ok(InsertOutcome::Created(res.last_insert_id)),
            TryInsertResult::Conflicted => {
                let id = self.existing_id(&session_id).await?.ok_or_else(|| {
                    ServiceError::InternalError(
                        "Conflicting order row disappeared during insert".to_string(),
                    )
                })?;
                Ok(InsertOutcome::AlreadyExists(id))
            }
            TryInsertResult::Empty => Err(ServiceError::InternalError(
                "Order insert produced no statement".to_string(),
            )),
        }
    }
}

/// Outcome of reconciling a paid session into an order.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOutcome {
    pub order_id: Uuid,
    /// False when an earlier call already recorded the order
    pub created: bool,
}

/// Converts completed payment sessions into durable orders: verifies
/// payment state with the provider, binds the order to the paying user,
/// and guarantees at most one order per session.
pub struct OrderReconciler {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn OrderStore>,
}

impl OrderReconciler {
    pub fn new(provider: Arc<dyn PaymentProvider>, store: Arc<dyn OrderStore>) -> Self {
        Self { provider, store }
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn order_from_session(
        &self,
        session_id: &str,
        user: &AuthenticatedUser,
    ) -> Result<ReconcileOutcome, ServiceError> {
        if session_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "session_id is required".to_string(),
            ));
        }

        let session = match self.provider.retrieve_session(session_id).await {
            Ok(session) => session,
            // An unknown or malformed session id is the caller's problem,
            // not a server fault.
            Err(ServiceError::PaymentProvider(msg)) => {
                return Err(ServiceError::InvalidInput(format!(
                    "Unable to retrieve checkout session: {}",
                    msg
                )));
            }
            Err(other) => return Err(other),
        };

        if session.payment_status != PaymentStatus::Paid {
            return Err(ServiceError::PaymentIncomplete);
        }

        if let Some(session_email) = session.customer_email.as_deref() {
            let user_email = user.email.as_deref().unwrap_or_default();
            if !session_email.eq_ignore_ascii_case(user_email) {
                return Err(ServiceError::Forbidden(
                    "Session does not match user".to_string(),
                ));
            }
        }

        // Fast path for retries; the insert below stays conflict-safe for
        // the window this check cannot see.
        if let Some(existing) = self.store.find_id_by_session(session_id).await? {
            info!(order_id = %existing, "Order already recorded for session");
            return Ok(ReconcileOutcome {
                order_id: existing,
                created: false,
            });
        }

        let new_order = derive_order(session_id, &session, user);

        match self.store.insert(new_order).await {
            Ok(InsertOutcome::Created(order_id)) => {
                info!(%order_id, "Order created from session");
                Ok(ReconcileOutcome {
                    order_id,
                    created: true,
                })
            }
            Ok(InsertOutcome::AlreadyExists(order_id)) => {
                info!(%order_id, "Concurrent reconciler won; returning existing order");
                Ok(ReconcileOutcome {
                    order_id,
                    created: false,
                })
            }
            Err(err) => {
                error!(error = %err, "Failed to save order");
                Err(err)
            }
        }
    }
}

/// Map a paid provider session onto the persisted order shape. Amounts
/// arrive as integer cents; orders store USD decimals.
fn derive_order(
    session_id: &str,
    session: &RetrievedSession,
    user: &AuthenticatedUser,
) -> NewOrder {
    let items: Vec<OrderLine> = session
        .line_items
        .iter()
        .map(|li| OrderLine {
            product_name: li
                .description
                .clone()
                .unwrap_or_else(|| "Product".to_string()),
            quantity: li.quantity.unwrap_or(1),
            price: cents_to_usd(li.amount_total),
        })
        .collect();

    let total = cents_to_usd(session.amount_total);
    let subtotal = session
        .amount_subtotal
        .map(|c| cents_to_usd(Some(c)))
        .unwrap_or(total);

    NewOrder {
        stripe_session_id: session_id.to_string(),
        user_id: user.id,
        customer_email: user.email.clone().unwrap_or_default(),
        customer_name: session.customer_name.clone().or_else(|| user.full_name.clone()),
        items,
        subtotal,
        tax: total - subtotal,
        total,
    }
}

fn cents_to_usd(cents: Option<i64>) -> Decimal {
    Decimal::new(cents.unwrap_or(0), 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stripe::SessionLineItem;
    use rust_decimal_macros::dec;

    fn paid_session() -> RetrievedSession {
        RetrievedSession {
            id: "cs_test_123".to_string(),
            payment_status: PaymentStatus::Paid,
            amount_total: Some(1307),
            amount_subtotal: Some(1198),
            customer_email: Some("amy@farmstand.example".to_string()),
            customer_name: Some("Amy Chen".to_string()),
            line_items: vec![SessionLineItem {
                description: Some("Mixed Salad Greens".to_string()),
                quantity: Some(2),
                amount_total: Some(1198),
            }],
        }
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: Uuid::new_v4(),
            email: Some("amy@farmstand.example".to_string()),
            full_name: None,
        }
    }

    #[test]
    fn amounts_are_derived_from_session_cents() {
        let user = user();
        let order = derive_order("cs_test_123", &paid_session(), &user);

        assert_eq!(order.total, dec!(13.07));
        assert_eq!(order.subtotal, dec!(11.98));
        assert_eq!(order.tax, dec!(1.09));
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].price, dec!(11.98));
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.user_id, user.id);
    }

    #[test]
    fn subtotal_falls_back_to_total() {
        let mut session = paid_session();
        session.amount_subtotal = None;
        let order = derive_order("cs_test_123", &session, &user());

        assert_eq!(order.subtotal, order.total);
        assert_eq!(order.tax, dec!(0.00));
    }

    #[test]
    fn missing_line_fields_get_defaults() {
        let mut session = paid_session();
        session.line_items = vec![SessionLineItem::default()];
        let order = derive_order("cs_test_123", &session, &user());

        assert_eq!(order.items[0].product_name, "Product");
        assert_eq!(order.items[0].quantity, 1);
        assert_eq!(order.items[0].price, dec!(0.00));
    }

    #[test]
    fn session_name_wins_over_token_name() {
        let mut caller = user();
        caller.full_name = Some("A. Chen".to_string());
        let order = derive_order("cs_test_123", &paid_session(), &caller);
        assert_eq!(order.customer_name.as_deref(), Some("Amy Chen"));

        let mut session = paid_session();
        session.customer_name = None;
        let order = derive_order("cs_test_123", &session, &caller);
        assert_eq!(order.customer_name.as_deref(), Some("A. Chen"));
    }
}
