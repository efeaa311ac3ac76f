use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{consts as perm, CurrentUser, Role},
    errors::ServiceError,
    models::status::OrderStatus,
    services::orders::CreateOrderRequest,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub comment: Option<String>,
}

/// POST /orders: create an order from the caller's cart.
pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(Role::Customer)?;
    let detail = state.services.orders.create_order(user.user_id, request).await?;

    state.event_sender.audit(
        user.user_id,
        "order.create",
        "order",
        Some(detail.order.id),
        None,
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(detail))))
}

/// GET /orders/my: the customer's own orders.
pub async fn list_my(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_for_customer(user.user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// GET /orders/assigned: active orders assigned to the calling courier.
pub async fn list_assigned(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(Role::Courier)?;
    let orders = state.services.orders.list_assigned(user.user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// GET /orders/open: the unclaimed pending pool.
pub async fn list_open(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(Role::Courier)?;
    let orders = state.services.orders.list_open().await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// GET /orders/all: management view.
pub async fn list_all(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::ORDERS_MANAGE)?;
    let orders = state.services.orders.list_all().await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// GET /orders/:id: single order with items and event trail.
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.orders.detail_for(order_id, &user).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// PATCH /orders/:id/status: role-gated state transition.
pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state
        .services
        .orders
        .set_status(order_id, request.status, &user, request.comment)
        .await?;

    state.event_sender.audit(
        user.user_id,
        "order.set_status",
        "order",
        Some(order_id),
        Some(request.status.to_string()),
    );
    Ok(Json(ApiResponse::success(detail)))
}

/// POST /orders/:id/claim: courier manually claims a pending order.
pub async fn claim_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(Role::Courier)?;
    let courier = state.services.dispatch.claim(order_id, user.user_id).await?;

    state.event_sender.audit(
        user.user_id,
        "order.claim",
        "order",
        Some(order_id),
        Some(format!("courier {}", courier.id)),
    );
    let detail = state.services.orders.detail(order_id).await?;
    Ok(Json(ApiResponse::success(detail)))
}
