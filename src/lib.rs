//! Freshline API Library
//!
//! Core of a grocery delivery platform: order lifecycle, courier dispatch,
//! warehouse stock ledger and pick-task workflow behind an HTTP surface.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod services;

use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::PrincipalResolver;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
    pub resolver: Arc<dyn PrincipalResolver>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
        resolver: Arc<dyn PrincipalResolver>,
    ) -> Self {
        let services =
            handlers::AppServices::new(db.clone(), event_sender.clone(), config.statement_timeout());
        Self {
            db,
            config,
            event_sender,
            services,
            resolver,
        }
    }
}

// Common response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes that require an authenticated principal. Permission and role
/// checks happen inside the handlers, against the resolved principal.
fn protected_routes() -> Router<AppState> {
    Router::new()
        // Orders
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/my", get(handlers::orders::list_my))
        .route("/orders/assigned", get(handlers::orders::list_assigned))
        .route("/orders/open", get(handlers::orders::list_open))
        .route("/orders/all", get(handlers::orders::list_all))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/status", patch(handlers::orders::update_status))
        .route("/orders/:id/claim", post(handlers::orders::claim_order))
        // Couriers
        .route("/couriers/me", get(handlers::couriers::my_profile))
        .route("/couriers/connect", post(handlers::couriers::connect))
        // Warehouse administration
        .route("/admin/stock/receive", post(handlers::warehouse::receive_stock))
        .route("/admin/stock/writeoff", post(handlers::warehouse::writeoff_stock))
        .route("/admin/stock/reserve", post(handlers::warehouse::reserve_stock))
        .route("/admin/stock/movements", get(handlers::warehouse::stock_movements))
        .route(
            "/admin/warehouse/overview",
            get(handlers::warehouse::warehouse_overview),
        )
        .route(
            "/admin/pick-tasks/from-order",
            post(handlers::warehouse::create_pick_task),
        )
        .route("/admin/pick-tasks", get(handlers::warehouse::list_pick_tasks))
        .route("/admin/pick-tasks/:id", get(handlers::warehouse::get_pick_task))
        .route(
            "/admin/pick-tasks/:id",
            patch(handlers::warehouse::transition_pick_task),
        )
}

/// Versioned API routes.
pub fn api_v1_routes(resolver: Arc<dyn PrincipalResolver>) -> Router<AppState> {
    Router::new()
        .merge(
            protected_routes()
                .route_layer(middleware::from_fn_with_state(resolver, auth::authenticate)),
        )
        .route("/status", get(api_status))
        .route("/health", get(health_check))
}

/// The complete application router with the ambient HTTP middleware stack.
pub fn app_router(state: AppState) -> Router {
    let resolver = state.resolver.clone();
    Router::new()
        .nest("/api/v1", api_v1_routes(resolver))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "service": "freshline-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": { "database": db_status },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let response = ApiResponse::success(42);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], 42);
        assert!(value["message"].is_null());
    }

    #[test]
    fn error_envelope_carries_message() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("oops"));
    }

    #[test]
    fn validation_envelope_lists_errors() {
        let response = ApiResponse::<()>::validation_errors(vec!["missing".into()]);
        assert_eq!(response.errors.unwrap().len(), 1);
    }
}
