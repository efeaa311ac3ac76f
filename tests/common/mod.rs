use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use freshline_api::{
    app_router,
    auth::{Claims, JwtPrincipalResolver},
    config::AppConfig,
    db,
    entities::{cart_item, courier, product, warehouse},
    events,
    services::dispatch::SYSTEM_ACTOR,
    AppState,
};

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Harness that spins up the full application router over a throwaway
/// SQLite database, one per test.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_file = std::env::temp_dir().join(format!("freshline_test_{}.db", Uuid::new_v4()));
        let _ = std::fs::remove_file(&db_file);

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            JWT_SECRET,
            "127.0.0.1",
            18_080,
            "test",
        );
        // One connection serializes SQLite writers and keeps tests
        // deterministic.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_sender, event_rx) = events::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let resolver = Arc::new(JwtPrincipalResolver::new(&cfg.jwt_secret));
        let state = AppState::new(db_arc, cfg.clone(), Arc::new(event_sender), resolver);
        let router = app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Issues a bearer token for the given principal.
    pub fn token_for(&self, user_id: Uuid, role: &str, permissions: &[&str]) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            active: true,
            exp: (now + chrono::Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("encode test token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        json: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {tok}"));
        }
        let body = if let Some(json) = json {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize request body"))
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

    // Seed helpers. These write through the entities directly so tests can
    // arrange state without going through the surfaces under test.

    pub async fn seed_product(&self, name: &str, price: Decimal) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            price: Set(price),
            stock_quantity: Set(0),
            in_stock: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed product")
    }

    pub async fn seed_cart_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> cart_item::Model {
        cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(Utc::now()),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed cart item")
    }

    pub async fn seed_warehouse(&self, name: &str) -> warehouse::Model {
        warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            address: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed warehouse")
    }

    /// A verified courier with all evidence documents on file.
    pub async fn seed_courier(
        &self,
        user_id: Uuid,
        status: &str,
        max_active_orders: i32,
    ) -> courier::Model {
        self.seed_courier_with_verification(user_id, status, max_active_orders, "approved")
            .await
    }

    pub async fn seed_courier_with_verification(
        &self,
        user_id: Uuid,
        status: &str,
        max_active_orders: i32,
        verification_status: &str,
    ) -> courier::Model {
        courier::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            status: Set(status.to_string()),
            max_active_orders: Set(max_active_orders),
            verification_status: Set(verification_status.to_string()),
            license_doc: Set(Some("license.jpg".into())),
            registration_doc: Set(Some("registration.jpg".into())),
            photo_doc: Set(Some("photo.jpg".into())),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed courier")
    }

    /// Receives stock through the ledger so the movement log and product
    /// aggregate stay consistent with what production code would produce.
    pub async fn seed_stock(&self, warehouse_id: Uuid, product_id: Uuid, qty: i32) {
        self.state
            .services
            .stock_ledger
            .receive(warehouse_id, product_id, qty, Some("seed".into()), SYSTEM_ACTOR)
            .await
            .expect("seed stock");
    }
}

/// Reads a response's status and JSON body.
pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse response body")
    };
    (status, value)
}
