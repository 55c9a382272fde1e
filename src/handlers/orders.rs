use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{success_response, validate_input};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OrderFromSessionRequest {
    /// Checkout session id returned by the payment provider
    #[validate(length(min = 1, message = "session_id is required"))]
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderFromSessionResponse {
    pub success: bool,
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
}

/// Record the order for a paid checkout session. Safe to retry: repeat
/// calls for the same session return the original order.
#[utoipa::path(
    post,
    path = "/api/v1/orders/from-session",
    request_body = OrderFromSessionRequest,
    responses(
        (status = 200, description = "Order recorded (or already existed)", body = OrderFromSessionResponse),
        (status = 400, description = "Missing session id, unknown session, or payment not completed"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Session was paid by a different account")
    ),
    tag = "orders"
)]
#[instrument(skip(state, payload), fields(user_id = %user.id))]
pub async fn create_order_from_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<OrderFromSessionRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(payload) = payload?;
    validate_input(&payload)?;

    let reconciler = state
        .services
        .reconciler
        .as_ref()
        .ok_or(ServiceError::NotConfigured("Stripe"))?;

    let outcome = reconciler
        .order_from_session(&payload.session_id, &user)
        .await?;

    Ok(success_response(OrderFromSessionResponse {
        success: true,
        order_id: outcome.order_id,
    }))
}
