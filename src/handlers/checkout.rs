use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::services::checkout::CartItemInput;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCheckoutSessionRequest {
    #[serde(default)]
    pub items: Vec<CartItemInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateCheckoutSessionResponse {
    /// Secret that mounts the embedded payment form in the browser
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
}

/// Create an embedded checkout session for a cart. Prices come from the
/// catalog, never from the request.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/session",
    request_body = CreateCheckoutSessionRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CreateCheckoutSessionResponse),
        (status = 400, description = "Empty, oversized, or fully unresolvable cart"),
        (status = 500, description = "Payment provider not configured or rejected the request")
    ),
    tag = "checkout"
)]
#[instrument(skip_all)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateCheckoutSessionRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(payload) = payload?;

    let checkout = state
        .services
        .checkout
        .as_ref()
        .ok_or(ServiceError::NotConfigured("Stripe"))?;

    let request_origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    let return_origin = state
        .config
        .resolve_checkout_origin(request_origin)
        .ok_or_else(|| {
            ServiceError::InvalidInput("No return origin available for checkout".to_string())
        })?;

    let session = checkout
        .create_session(&payload.items, &return_origin)
        .await?;

    Ok(success_response(CreateCheckoutSessionResponse {
        client_secret: session.client_secret,
    }))
}
