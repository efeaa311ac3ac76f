use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{consts as perm, CurrentUser},
    errors::ServiceError,
    models::status::PickTaskStatus,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct StockMovementRequest {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub qty: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePickTaskRequest {
    pub order_id: Uuid,
    pub warehouse_id: Uuid,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PickTaskTransitionRequest {
    pub status: PickTaskStatus,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PickTaskListQuery {
    pub status: Option<PickTaskStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
}

/// POST /admin/stock/receive: goods arriving at a warehouse.
pub async fn receive_stock(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<StockMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::WAREHOUSE_MANAGE)?;
    let stock = state
        .services
        .stock_ledger
        .receive(
            request.warehouse_id,
            request.product_id,
            request.qty,
            request.reason,
            user.user_id,
        )
        .await?;

    state.event_sender.audit(
        user.user_id,
        "stock.receive",
        "warehouse_stock",
        Some(stock.id),
        Some(format!("+{}", request.qty)),
    );
    Ok(Json(ApiResponse::success(stock)))
}

/// POST /admin/stock/writeoff: removal of unreserved stock.
pub async fn writeoff_stock(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<StockMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::WAREHOUSE_MANAGE)?;
    let stock = state
        .services
        .stock_ledger
        .writeoff(
            request.warehouse_id,
            request.product_id,
            request.qty,
            request.reason,
            user.user_id,
        )
        .await?;

    state.event_sender.audit(
        user.user_id,
        "stock.writeoff",
        "warehouse_stock",
        Some(stock.id),
        Some(format!("-{}", request.qty)),
    );
    Ok(Json(ApiResponse::success(stock)))
}

/// POST /admin/stock/reserve: manual reservation outside the pick flow.
pub async fn reserve_stock(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<StockMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::WAREHOUSE_MANAGE)?;
    let stock = state
        .services
        .stock_ledger
        .reserve(
            request.warehouse_id,
            request.product_id,
            request.qty,
            request.reason,
            None,
            user.user_id,
        )
        .await?;

    state.event_sender.audit(
        user.user_id,
        "stock.reserve",
        "warehouse_stock",
        Some(stock.id),
        Some(format!("{}", request.qty)),
    );
    Ok(Json(ApiResponse::success(stock)))
}

/// GET /admin/stock/movements: ledger history for one (warehouse, product).
pub async fn stock_movements(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<MovementsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::WAREHOUSE_MANAGE)?;
    let movements = state
        .services
        .stock_ledger
        .movements(query.warehouse_id, query.product_id)
        .await?;
    Ok(Json(ApiResponse::success(movements)))
}

/// GET /admin/warehouse/overview: stock position with low-stock flags.
pub async fn warehouse_overview(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::WAREHOUSE_MANAGE)?;
    let rows = state.services.stock_ledger.warehouse_overview().await?;
    Ok(Json(ApiResponse::success(rows)))
}

/// POST /admin/pick-tasks/from-order: start warehouse picking for an order.
pub async fn create_pick_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreatePickTaskRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::WAREHOUSE_MANAGE)?;
    let detail = state
        .services
        .pick_tasks
        .create_for_order(
            request.order_id,
            request.warehouse_id,
            request.assignee_id,
            user.user_id,
        )
        .await?;

    state.event_sender.audit(
        user.user_id,
        "pick_task.create",
        "pick_task",
        Some(detail.task.id),
        Some(format!("order {}", request.order_id)),
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(detail))))
}

/// PATCH /admin/pick-tasks/:id: advance or cancel a pick task.
pub async fn transition_pick_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<Uuid>,
    Json(request): Json<PickTaskTransitionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::WAREHOUSE_MANAGE)?;
    let detail = state
        .services
        .pick_tasks
        .transition(task_id, request.status, request.assignee_id, user.user_id)
        .await?;

    state.event_sender.audit(
        user.user_id,
        "pick_task.transition",
        "pick_task",
        Some(task_id),
        Some(request.status.to_string()),
    );
    Ok(Json(ApiResponse::success(detail)))
}

/// GET /admin/pick-tasks: list tasks, optionally by status.
pub async fn list_pick_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PickTaskListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::WAREHOUSE_MANAGE)?;
    let tasks = state.services.pick_tasks.list(query.status).await?;
    Ok(Json(ApiResponse::success(tasks)))
}

/// GET /admin/pick-tasks/:id: one task with its line items.
pub async fn get_pick_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_permission(perm::WAREHOUSE_MANAGE)?;
    let detail = state.services.pick_tasks.get(task_id).await?;
    Ok(Json(ApiResponse::success(detail)))
}
