use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    middleware,
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use storefront_api::{
    auth::AuthKeys,
    config::AppConfig,
    db,
    entities::{
        coupon::{self, CouponKind},
        product_variant, shipping_company,
    },
    events::{self, EventSender},
    handlers::AppServices,
    middleware_helpers::request_id::request_id_middleware,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness that runs the full router against a throwaway SQLite
/// database file. Every instance gets its own file so tests can run in
/// parallel.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    db_path: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct a test application after letting the caller adjust the
    /// configuration, e.g. to point the shipping partner somewhere.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let db_path = format!("storefront_test_{}.db", Uuid::new_v4().simple());

        let mut cfg = AppConfig::new(
            format!("sqlite://{db_path}?mode=rwc"),
            "storefront_wallet_checkout_jwt_rotation_key_v3_qwertyuiop_zxcvbnm_13579_xK"
                .to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        // No shipping partner by default; registration is skipped silently.
        cfg.shipping_partner_url = None;
        cfg.shipping_retry_attempts = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth = AuthKeys::from_config(&cfg);
        let services = AppServices::new(db_arc.clone(), event_sender.clone(), &cfg)
            .expect("application services should build");

        let state = AppState {
            db: db_arc,
            config: cfg.clone(),
            auth,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .merge(storefront_api::root_routes())
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(state.clone());

        Self {
            router,
            state,
            db_path,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Register a customer through the API and return their bearer token
    /// and id.
    pub async fn register_customer(&self, email: &str, password: &str) -> (String, Uuid) {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({
                    "email": email,
                    "name": "Test Customer",
                    "password": password,
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), 201, "registration should succeed");

        let body = json_body(response).await;
        let token = body["token"]
            .as_str()
            .expect("token in registration response")
            .to_string();
        let customer_id = body["customer"]["id"]
            .as_str()
            .expect("customer id in registration response")
            .parse()
            .expect("customer id should be a uuid");
        (token, customer_id)
    }

    /// Top up the wallet of the token's owner through the API.
    pub async fn deposit(&self, token: &str, amount: &str) {
        let response = self
            .request(
                Method::POST,
                "/api/v1/wallet/deposit",
                Some(json!({ "amount": amount })),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), 201, "deposit should succeed");
    }

    /// Current wallet balance straight from the service layer.
    pub async fn wallet_balance(&self, customer_id: Uuid) -> Decimal {
        self.state
            .services
            .wallet
            .balance(customer_id)
            .await
            .expect("wallet balance lookup")
    }

    pub async fn seed_variant(
        &self,
        sku: &str,
        price: Decimal,
        cost: Option<Decimal>,
    ) -> product_variant::Model {
        let now = Utc::now();
        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            title: Set(format!("Test Variant {}", sku)),
            image_ref: Set(None),
            color: Set(Some("black".to_string())),
            size: Set(Some("M".to_string())),
            price: Set(price),
            cost: Set(cost),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed product variant for tests")
    }

    pub async fn seed_shipping_company(
        &self,
        name: &str,
        price: Decimal,
        estimated_days: i32,
    ) -> shipping_company::Model {
        let now = Utc::now();
        shipping_company::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            price: Set(price),
            estimated_days: Set(estimated_days),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed shipping company for tests")
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn seed_coupon(
        &self,
        code: &str,
        kind: CouponKind,
        value: Decimal,
        min_order_amount: Option<Decimal>,
        max_cashback: Option<Decimal>,
        expires_at: Option<DateTime<Utc>>,
    ) -> coupon::Model {
        let now = Utc::now();
        coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            kind: Set(kind),
            value: Set(value),
            min_order_amount: Set(min_order_amount),
            max_cashback: Set(max_cashback),
            active: Set(true),
            starts_at: Set(None),
            expires_at: Set(expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed coupon for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.db_path, suffix));
        }
    }
}

pub async fn json_body(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
