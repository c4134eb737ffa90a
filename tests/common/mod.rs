use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use storefront_api::{
    auth::Claims,
    config::AppConfig,
    db,
    entities::{address, cart_item, product, user, IdList},
    errors::ServiceError,
    events::{self, EventSender},
    gateway::{
        CreateSessionRequest, GatewaySession, PaymentGateway, SettledLineItem, SettledProduct,
    },
    handlers::AppServices,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret_for_integration";

/// Gateway double. Records created sessions and serves registered line
/// items, standing in for the hosted-checkout API on the other side of
/// the trait seam.
#[derive(Default)]
pub struct MockPaymentGateway {
    created: Mutex<Vec<CreateSessionRequest>>,
    line_items: Mutex<HashMap<String, Vec<SettledLineItem>>>,
}

impl MockPaymentGateway {
    pub fn created_sessions(&self) -> Vec<CreateSessionRequest> {
        self.created.lock().expect("gateway mutex").clone()
    }

    pub fn register_line_items(&self, session_id: &str, items: Vec<SettledLineItem>) {
        self.line_items
            .lock()
            .expect("gateway mutex")
            .insert(session_id.to_string(), items);
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError> {
        self.created.lock().expect("gateway mutex").push(request);
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        Ok(GatewaySession {
            url: format!("https://gateway.test/pay/{}", id),
            id,
        })
    }

    async fn list_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<SettledLineItem>, ServiceError> {
        self.line_items
            .lock()
            .expect("gateway mutex")
            .get(session_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::GatewayError(format!("no line items for session {}", session_id))
            })
    }
}

/// Builds a settled line item the way the gateway reports one.
pub fn settled_line_item(product_id: Uuid, name: &str, quantity: i32) -> SettledLineItem {
    SettledLineItem {
        description: Some(name.to_string()),
        quantity,
        product: SettledProduct {
            name: Some(name.to_string()),
            images: vec![format!("https://cdn.test/{}.jpg", product_id)],
            metadata: HashMap::from([("product_id".to_string(), product_id.to_string())]),
        },
    }
}

/// Test application backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<MockPaymentGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.payment_webhook_secret = TEST_WEBHOOK_SECRET.to_string();
        cfg.payment_webhook_tolerance_secs = Some(300);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::ensure_schema(&pool).await.expect("failed to create schema");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(MockPaymentGateway::default());
        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            Arc::new(cfg.clone()),
            gateway.clone(),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
        }
    }

    /// Bearer token for a seeded user, issued the way the identity
    /// service would.
    pub fn token_for(&self, user: &user::Model) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: Some(user.email.clone()),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(1)).timestamp(),
            iss: self.state.config.auth_issuer.clone(),
            aud: self.state.config.auth_audience.clone(),
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(self.state.config.jwt_secret.as_bytes()),
        )
        .expect("encode access token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Raw-body request used by the webhook tests; the payload bytes must
    /// reach the handler unmodified for signature verification.
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder.body(Body::from(body)).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_user(&self, email: &str) -> user::Model {
        let now = Utc::now();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test User".to_string()),
            email: Set(email.to_string()),
            password_hash: Set(String::new()),
            shopping_cart: Set(IdList::default()),
            order_history: Set(IdList::default()),
            address_details: Set(IdList::default()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user")
    }

    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        discount: i32,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            image: Set(product::ImageList(vec![format!(
                "https://cdn.test/{}.jpg",
                name.to_lowercase().replace(' ', "-")
            )])),
            price: Set(price),
            discount: Set(discount),
            description: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_address(&self, user_id: Uuid) -> address::Model {
        let now = Utc::now();
        address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            address_line: Set("42 MG Road".to_string()),
            city: Set("Bengaluru".to_string()),
            state: Set("Karnataka".to_string()),
            country: Set("IN".to_string()),
            pincode: Set("560001".to_string()),
            mobile: Set(9_876_543_210),
            status: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed address")
    }

    /// Puts a product into the user's cart through the cart service so
    /// the mirror column stays consistent, then sets the quantity.
    pub async fn seed_cart_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> cart_item::Model {
        let carts = self.state.services.carts.clone();
        carts.add_item(user_id, product_id).await.expect("add cart item");
        if quantity > 1 {
            carts
                .update_quantity(user_id, product_id, quantity)
                .await
                .expect("set cart quantity")
        } else {
            cart_item::Entity::find()
                .filter(cart_item::Column::UserId.eq(user_id))
                .filter(cart_item::Column::ProductId.eq(product_id))
                .one(&*self.state.db)
                .await
                .expect("load cart item")
                .expect("cart item present")
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Parses a JSON response body.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("parse response json")
}

/// Signed webhook header for a payload, using the test secret.
pub fn webhook_headers(payload: &[u8]) -> String {
    storefront_api::gateway::signature::signature_header(
        Utc::now().timestamp(),
        payload,
        TEST_WEBHOOK_SECRET,
    )
}
