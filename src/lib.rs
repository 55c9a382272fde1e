pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::{AuthConfig, AuthService};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::services::catalog::{CatalogStore, SeaOrmCatalogStore};
use crate::services::checkout::CheckoutService;
use crate::services::orders::{OrderReconciler, OrderStore, SeaOrmOrderStore};
use crate::services::stripe::{PaymentProvider, StripeClient};

/// Services shared by the HTTP handlers. Payment and auth services are
/// optional: when their secrets are absent the endpoints that need them
/// answer with a configuration error instead of failing at startup.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<dyn CatalogStore>,
    pub orders: Arc<dyn OrderStore>,
    pub checkout: Option<Arc<CheckoutService>>,
    pub reconciler: Option<Arc<OrderReconciler>>,
    pub auth: Option<Arc<AuthService>>,
}

impl AppServices {
    pub fn from_config(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let catalog: Arc<dyn CatalogStore> = Arc::new(SeaOrmCatalogStore::new(db.clone()));
        let orders: Arc<dyn OrderStore> = Arc::new(SeaOrmOrderStore::new(db));

        let provider: Option<Arc<dyn PaymentProvider>> = match config
            .stripe_secret_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
        {
            Some(key) => Some(Arc::new(StripeClient::new(
                key.to_string(),
                config.stripe_api_base.clone(),
                Duration::from_secs(config.http_client_timeout_secs),
            )?)),
            None => {
                warn!("Stripe secret key not configured; checkout endpoints disabled");
                None
            }
        };

        let checkout = provider.as_ref().map(|p| {
            Arc::new(CheckoutService::new(
                catalog.clone(),
                p.clone(),
                config.checkout_max_cart_items,
            ))
        });
        let reconciler = provider
            .as_ref()
            .map(|p| Arc::new(OrderReconciler::new(p.clone(), orders.clone())));

        let auth = match config
            .jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            Some(secret) => Some(Arc::new(AuthService::new(AuthConfig {
                jwt_secret: secret.to_string(),
                audience: config.auth_audience.clone(),
            }))),
            None => {
                warn!("JWT secret not configured; authenticated endpoints disabled");
                None
            }
        };

        Ok(Self {
            catalog,
            orders,
            checkout,
            reconciler,
            auth,
        })
    }
}

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub services: Arc<AppServices>,
}

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/checkout/session",
            post(handlers::checkout::create_checkout_session),
        )
        .route(
            "/orders/from-session",
            post(handlers::orders::create_order_from_session),
        )
}

/// Assemble the full router: health + v1 API + Swagger UI, wrapped in
/// tracing, request timeout, and CORS layers.
pub fn app_router(state: AppState, cors: CorsLayer) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/", get(|| async { "farmstand-api up" }))
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer from config. Outside development an explicit
/// origin list (or an explicit any-origin override) is required.
pub fn build_cors_layer(config: &AppConfig) -> anyhow::Result<CorsLayer> {
    let configured: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !configured.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(configured)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    if config.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if config.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        return Ok(CorsLayer::permissive());
    }

    anyhow::bail!(
        "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
    )
}
