use crate::errors::ServiceError;
use crate::services::catalog::CatalogStore;
use crate::services::stripe::{CheckoutLineItem, CreatedCheckoutSession, PaymentProvider};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

const MIN_QUANTITY: i64 = 1;
const MAX_QUANTITY: i64 = 99;
const MAX_PRODUCT_NAME_CHARS: usize = 500;

/// A cart entry as submitted by the client. Price and name are never
/// accepted from the request; only the id and quantity matter, and both
/// tolerate junk: a missing or non-numeric value becomes `None` so one
/// bad line cannot abort the rest of the cart.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CartItemInput {
    /// Catalog product id
    #[serde(rename = "productId", default, deserialize_with = "lenient_i64")]
    #[schema(example = 3)]
    pub product_id: Option<i64>,

    /// Requested quantity; clamped to [1, 99], defaults to 1
    #[serde(default, deserialize_with = "lenient_i64")]
    #[schema(example = 2)]
    pub quantity: Option<i64>,
}

/// Accept any JSON value where the client should have sent an integer.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

/// Builds checkout sessions from untrusted carts, re-pricing every line
/// from the catalog.
pub struct CheckoutService {
    catalog: Arc<dyn CatalogStore>,
    provider: Arc<dyn PaymentProvider>,
    max_cart_items: usize,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        provider: Arc<dyn PaymentProvider>,
        max_cart_items: usize,
    ) -> Self {
        Self {
            catalog,
            provider,
            max_cart_items,
        }
    }

    /// Validate the cart, resolve authoritative prices, and create an
    /// embedded checkout session. A single unresolvable line is skipped
    /// rather than failing the whole cart; a cart with no valid lines is
    /// rejected.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_session(
        &self,
        items: &[CartItemInput],
        return_origin: &str,
    ) -> Result<CreatedCheckoutSession, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError("No items provided".to_string()));
        }
        if items.len() > self.max_cart_items {
            return Err(ServiceError::ValidationError(format!(
                "Cart cannot exceed {} items",
                self.max_cart_items
            )));
        }

        let mut ids: Vec<i64> = items
            .iter()
            .filter_map(|i| i.product_id)
            .filter(|id| *id > 0)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(ServiceError::InvalidInput(
                "No valid product ids in cart".to_string(),
            ));
        }

        // A cart that resolves to nothing is the client's problem either
        // way, so a failed lookup answers like an empty one.
        let products = match self.catalog.products_by_ids(&ids).await {
            Ok(products) => products,
            Err(err) => {
                warn!(error = %err, "Catalog lookup failed");
                Vec::new()
            }
        };
        if products.is_empty() {
            return Err(ServiceError::InvalidInput(
                "No matching products found".to_string(),
            ));
        }
        let by_id: HashMap<i64, _> = products.into_iter().map(|p| (p.id, p)).collect();

        let line_items = build_line_items(items, &by_id);
        if line_items.is_empty() {
            return Err(ServiceError::InvalidInput("No valid line items".to_string()));
        }

        info!(line_count = line_items.len(), "Creating checkout session");
        self.provider
            .create_embedded_session(&line_items, return_origin)
            .await
    }
}

/// Resolve each cart entry against the catalog. Entries referencing a
/// missing or out-of-stock product, or one whose price rounds below one
/// cent, are dropped.
fn build_line_items(
    items: &[CartItemInput],
    catalog: &HashMap<i64, crate::services::catalog::CatalogProduct>,
) -> Vec<CheckoutLineItem> {
    items
        .iter()
        .filter_map(|item| {
            let product_id = item.product_id.filter(|id| *id > 0)?;
            let product = match catalog.get(&product_id) {
                Some(p) if p.in_stock => p,
                Some(_) => {
                    debug!(product_id, "Skipping out-of-stock item");
                    return None;
                }
                None => {
                    debug!(product_id, "Skipping unknown product id");
                    return None;
                }
            };

            let unit_amount = unit_amount_cents(product.price)?;

            Some(CheckoutLineItem {
                name: truncate_name(&product.name),
                unit_amount,
                quantity: clamp_quantity(item.quantity),
            })
        })
        .collect()
}

/// Integer cents from a decimal USD price, rounding half away from zero
/// at the cent boundary. Prices below one cent are unsellable.
fn unit_amount_cents(price: Decimal) -> Option<i64> {
    let cents = (price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()?;
    (cents >= 1).then_some(cents)
}

fn clamp_quantity(requested: Option<i64>) -> i64 {
    requested.unwrap_or(MIN_QUANTITY).clamp(MIN_QUANTITY, MAX_QUANTITY)
}

fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_PRODUCT_NAME_CHARS).collect()
}
