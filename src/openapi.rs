use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Farmstand API",
        version = "0.1.0",
        description = r#"
Backend for the farm marketplace storefront.

Carts are re-priced server-side from the product catalog before a payment
session is created, and completed sessions are reconciled into orders
exactly once per session.

## Authentication

Order reconciliation requires the shopper's bearer token:

```
Authorization: Bearer <access-token>
```
"#
    ),
    paths(
        crate::handlers::checkout::create_checkout_session,
        crate::handlers::orders::create_order_from_session,
        crate::handlers::health::health_check,
    ),
    components(schemas(
        crate::handlers::checkout::CreateCheckoutSessionRequest,
        crate::handlers::checkout::CreateCheckoutSessionResponse,
        crate::handlers::orders::OrderFromSessionRequest,
        crate::handlers::orders::OrderFromSessionResponse,
        crate::handlers::health::HealthResponse,
        crate::handlers::health::ComponentStatus,
        crate::services::checkout::CartItemInput,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "checkout", description = "Payment session creation"),
        (name = "orders", description = "Order reconciliation"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
