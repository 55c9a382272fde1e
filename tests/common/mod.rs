#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use tower::ServiceExt;
use uuid::Uuid;

use farmstand_api::auth::{AuthConfig, AuthService};
use farmstand_api::config::AppConfig;
use farmstand_api::errors::ServiceError;
use farmstand_api::services::catalog::{CatalogProduct, CatalogStore};
use farmstand_api::services::checkout::CheckoutService;
use farmstand_api::services::orders::{
    InsertOutcome, NewOrder, OrderReconciler, OrderStore,
};
use farmstand_api::services::stripe::{
    CheckoutLineItem, CreatedCheckoutSession, PaymentProvider, PaymentStatus, RetrievedSession,
    SessionLineItem,
};
use farmstand_api::{app_router, build_cors_layer, AppServices, AppState};

pub const TEST_JWT_SECRET: &str = "farmstand-test-jwt-secret";
pub const ALLOWED_ORIGINS: &str = "http://localhost:5173,https://shop.farmstand.example";

pub struct InMemoryCatalog {
    products: Vec<CatalogProduct>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<CatalogProduct>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<CatalogProduct>, ServiceError> {
        Ok(self
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryOrders {
    orders: Mutex<HashMap<String, (Uuid, NewOrder)>>,
}

impl InMemoryOrders {
    pub fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn saved(&self, session_id: &str) -> Option<NewOrder> {
        self.orders
            .lock()
            .unwrap()
            .get(session_id)
            .map(|(_, order)| order.clone())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrders {
    async fn find_id_by_session(&self, session_id: &str) -> Result<Option<Uuid>, ServiceError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .get(session_id)
            .map(|(id, _)| *id))
    }

    async fn insert(&self, order: NewOrder) -> Result<InsertOutcome, ServiceError> {
        let mut orders = self.orders.lock().unwrap();
        if let Some((existing, _)) = orders.get(&order.stripe_session_id) {
            return Ok(InsertOutcome::AlreadyExists(*existing));
        }
        let id = Uuid::new_v4();
        orders.insert(order.stripe_session_id.clone(), (id, order));
        Ok(InsertOutcome::Created(id))
    }
}

#[derive(Default)]
pub struct FakePaymentProvider {
    sessions: Mutex<HashMap<String, RetrievedSession>>,
    pub created: Mutex<Vec<(Vec<CheckoutLineItem>, String)>>,
    pub fail_create: Mutex<Option<String>>,
}

impl FakePaymentProvider {
    pub fn with_sessions(sessions: Vec<RetrievedSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into_iter().map(|s| (s.id.clone(), s)).collect()),
            ..Default::default()
        }
    }

    pub fn add_session(&self, session: RetrievedSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
    }

    pub fn last_created(&self) -> Option<(Vec<CheckoutLineItem>, String)> {
        self.created.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn create_embedded_session(
        &self,
        line_items: &[CheckoutLineItem],
        return_origin: &str,
    ) -> Result<CreatedCheckoutSession, ServiceError> {
        if let Some(msg) = self.fail_create.lock().unwrap().clone() {
            return Err(ServiceError::PaymentProvider(msg));
        }
        self.created
            .lock()
            .unwrap()
            .push((line_items.to_vec(), return_origin.to_string()));
        Ok(CreatedCheckoutSession {
            id: "cs_test_fake".to_string(),
            client_secret: "cs_test_fake_secret_abc123".to_string(),
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<RetrievedSession, ServiceError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::PaymentProvider(format!(
                    "No such checkout session: '{}'",
                    session_id
                ))
            })
    }
}

/// Catalog fixture mirroring the storefront's seed data.
pub fn sample_products() -> Vec<CatalogProduct> {
    vec![
        CatalogProduct {
            id: 1,
            name: "Heirloom Tomatoes".to_string(),
            price: dec!(4.50),
            in_stock: true,
        },
        CatalogProduct {
            id: 3,
            name: "Mixed Salad Greens".to_string(),
            price: dec!(5.99),
            in_stock: true,
        },
        CatalogProduct {
            id: 7,
            name: "Raw Wildflower Honey".to_string(),
            price: dec!(12.00),
            in_stock: false,
        },
    ]
}

pub fn paid_session(id: &str, email: &str) -> RetrievedSession {
    RetrievedSession {
        id: id.to_string(),
        payment_status: PaymentStatus::Paid,
        amount_total: Some(1307),
        amount_subtotal: Some(1198),
        customer_email: Some(email.to_string()),
        customer_name: Some("Amy Chen".to_string()),
        line_items: vec![SessionLineItem {
            description: Some("Mixed Salad Greens".to_string()),
            quantity: Some(2),
            amount_total: Some(1198),
        }],
    }
}

pub struct TestApp {
    pub router: Router,
    pub provider: Arc<FakePaymentProvider>,
    pub orders: Arc<InMemoryOrders>,
    pub auth: Arc<AuthService>,
}

pub struct TestAppBuilder {
    products: Vec<CatalogProduct>,
    sessions: Vec<RetrievedSession>,
    stripe_configured: bool,
    auth_configured: bool,
    environment: String,
    cors_allowed_origins: Option<String>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            products: sample_products(),
            sessions: Vec::new(),
            stripe_configured: true,
            auth_configured: true,
            environment: "production".to_string(),
            cors_allowed_origins: Some(ALLOWED_ORIGINS.to_string()),
        }
    }
}

impl TestAppBuilder {
    pub fn products(mut self, products: Vec<CatalogProduct>) -> Self {
        self.products = products;
        self
    }

    pub fn sessions(mut self, sessions: Vec<RetrievedSession>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn without_stripe(mut self) -> Self {
        self.stripe_configured = false;
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.auth_configured = false;
        self
    }

    pub fn environment(mut self, env: &str) -> Self {
        self.environment = env.to_string();
        self
    }

    pub fn cors_origins(mut self, origins: Option<&str>) -> Self {
        self.cors_allowed_origins = origins.map(ToString::to_string);
        self
    }

    pub fn build(self) -> TestApp {
        let mut config = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            self.environment,
        );
        config.cors_allowed_origins = self.cors_allowed_origins;
        if self.auth_configured {
            config.jwt_secret = Some(TEST_JWT_SECRET.to_string());
        }
        if self.stripe_configured {
            config.stripe_secret_key = Some("sk_test_unused_by_fake".to_string());
        }

        let catalog = Arc::new(InMemoryCatalog::new(self.products));
        let provider = Arc::new(FakePaymentProvider::with_sessions(self.sessions));
        let orders = Arc::new(InMemoryOrders::default());

        let checkout = self.stripe_configured.then(|| {
            Arc::new(CheckoutService::new(
                catalog.clone() as Arc<dyn CatalogStore>,
                provider.clone() as Arc<dyn PaymentProvider>,
                config.checkout_max_cart_items,
            ))
        });
        let reconciler = self.stripe_configured.then(|| {
            Arc::new(OrderReconciler::new(
                provider.clone() as Arc<dyn PaymentProvider>,
                orders.clone() as Arc<dyn OrderStore>,
            ))
        });

        // Always construct an AuthService so tests can mint tokens even
        // when the app itself is built without one.
        let auth = Arc::new(AuthService::new(AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            audience: config.auth_audience.clone(),
        }));

        let services = AppServices {
            catalog,
            orders: orders.clone() as Arc<dyn OrderStore>,
            checkout,
            reconciler,
            auth: self.auth_configured.then(|| auth.clone()),
        };

        let cors = build_cors_layer(&config).expect("CORS config should be valid in tests");
        let state = AppState {
            db: Arc::new(DatabaseConnection::Disconnected),
            config: Arc::new(config),
            services: Arc::new(services),
        };

        TestApp {
            router: app_router(state, cors),
            provider,
            orders,
            auth,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    pub fn bearer_token(&self, user_id: Uuid, email: &str) -> String {
        self.auth
            .issue_token(user_id, Some(email), Some("Amy Chen"), 3600)
            .expect("token minting should not fail")
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request should build"),
            None => builder.body(Body::empty()).expect("request should build"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should answer");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, headers, json)
    }

    pub async fn post_json(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let (status, _, json) = self.request("POST", uri, headers, Some(body)).await;
        (status, json)
    }

    /// Post a raw body, bypassing JSON serialization. For exercising
    /// malformed payloads.
    pub async fn post_raw(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should answer");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}
