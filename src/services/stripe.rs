use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Payment state of a checkout session as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    NoPaymentRequired,
}

/// A priced, quantified entry submitted to the provider when creating a
/// checkout session. Amounts are integer cents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: i64,
}

/// Handle returned by session creation; the client secret drives the
/// embedded payment form.
#[derive(Debug, Clone)]
pub struct CreatedCheckoutSession {
    pub id: String,
    pub client_secret: String,
}

/// Line item of a completed session, as expanded by the provider.
#[derive(Debug, Clone, Default)]
pub struct SessionLineItem {
    pub description: Option<String>,
    pub quantity: Option<i64>,
    /// Line total in cents (unit amount times quantity, after discounts)
    pub amount_total: Option<i64>,
}

/// A checkout session retrieved from the provider for reconciliation.
#[derive(Debug, Clone)]
pub struct RetrievedSession {
    pub id: String,
    pub payment_status: PaymentStatus,
    pub amount_total: Option<i64>,
    pub amount_subtotal: Option<i64>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub line_items: Vec<SessionLineItem>,
}

/// Payment provider seam. The production implementation talks to Stripe;
/// tests substitute an in-memory fake.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create an embedded-mode payment session. `return_origin` must
    /// already be resolved against the CORS allow-list.
    async fn create_embedded_session(
        &self,
        line_items: &[CheckoutLineItem],
        return_origin: &str,
    ) -> Result<CreatedCheckoutSession, ServiceError>;

    /// Retrieve a session by id with line items expanded.
    async fn retrieve_session(&self, session_id: &str) -> Result<RetrievedSession, ServiceError>;
}

/// Stripe client speaking the form-encoded REST API directly.
#[derive(Clone)]
pub struct StripeClient {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeSessionObject {
    id: String,
    client_secret: Option<String>,
    #[serde(default)]
    payment_status: Option<PaymentStatus>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    amount_subtotal: Option<i64>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<StripeCustomerDetails>,
    #[serde(default)]
    line_items: Option<StripeLineItemList>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomerDetails {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeLineItemList {
    #[serde(default)]
    data: Vec<StripeLineItem>,
}

#[derive(Debug, Deserialize)]
struct StripeLineItem {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    quantity: Option<i64>,
    #[serde(default)]
    amount_total: Option<i64>,
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        api_base: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client init failed: {}", e)))?;
        Ok(Self {
            secret_key,
            api_base,
            client,
        })
    }

    async fn error_from_response(response: reqwest::Response) -> ServiceError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or_else(|| format!("Stripe returned status {}", status));
        warn!(%status, "Stripe API error: {}", message);
        ServiceError::PaymentProvider(message)
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self, line_items))]
    async fn create_embedded_session(
        &self,
        line_items: &[CheckoutLineItem],
        return_origin: &str,
    ) -> Result<CreatedCheckoutSession, ServiceError> {
        let mut params: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("ui_mode".into(), "embedded".into()),
            (
                "return_url".into(),
                format!(
                    "{}/checkout-success?session_id={{CHECKOUT_SESSION_ID}}",
                    return_origin
                ),
            ),
        ];

        for (i, item) in line_items.iter().enumerate() {
            params.push((
                format!("line_items[{}][price_data][currency]", i),
                "usd".into(),
            ));
            params.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            params.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount.to_string(),
            ));
            params.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, Some(""))
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentProvider(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let session: StripeSessionObject = response.json().await.map_err(|e| {
            ServiceError::PaymentProvider(format!("Failed to parse Stripe response: {}", e))
        })?;

        let client_secret = session.client_secret.ok_or_else(|| {
            ServiceError::PaymentProvider("Stripe session missing client secret".to_string())
        })?;

        info!(session_id = %session.id, "Checkout session created");
        Ok(CreatedCheckoutSession {
            id: session.id,
            client_secret,
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> Result<RetrievedSession, ServiceError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.api_base, session_id
            ))
            .query(&[("expand[]", "line_items")])
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| ServiceError::PaymentProvider(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let session: StripeSessionObject = response.json().await.map_err(|e| {
            ServiceError::PaymentProvider(format!("Failed to parse Stripe response: {}", e))
        })?;

        let (details_email, details_name) = session
            .customer_details
            .map(|d| (d.email, d.name))
            .unwrap_or((None, None));

        Ok(RetrievedSession {
            id: session.id,
            payment_status: session.payment_status.unwrap_or(PaymentStatus::Unpaid),
            amount_total: session.amount_total,
            amount_subtotal: session.amount_subtotal,
            customer_email: details_email.or(session.customer_email),
            customer_name: details_name,
            line_items: session
                .line_items
                .map(|l| {
                    l.data
                        .into_iter()
                        .map(|li| SessionLineItem {
                            description: li.description,
                            quantity: li.quantity,
                            amount_total: li.amount_total,
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}
