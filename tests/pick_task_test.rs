mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

use freshline_api::{
    entities::{pick_task, warehouse_stock},
    errors::ServiceError,
    models::status::PickTaskStatus,
    services::dispatch::SYSTEM_ACTOR,
};

use common::{read_json, TestApp};

/// Seeds a customer order with two lines through the real order flow.
async fn seed_order(app: &TestApp, with_stock_for_all_lines: bool) -> (Uuid, Uuid, Uuid, Uuid) {
    let warehouse = app.seed_warehouse("central").await;
    let milk = app.seed_product("Milk 1L", dec!(1.89)).await;
    let bread = app.seed_product("Bread", dec!(0.99)).await;

    app.seed_stock(warehouse.id, milk.id, 10).await;
    if with_stock_for_all_lines {
        app.seed_stock(warehouse.id, bread.id, 10).await;
    }

    let customer_id = Uuid::new_v4();
    app.seed_cart_item(customer_id, milk.id, 2).await;
    app.seed_cart_item(customer_id, bread.id, 3).await;

    let token = app.token_for(customer_id, "customer", &[]);
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "delivery_address": "Springfield, Baker Street, 21" })),
            Some(&token),
        )
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id: Uuid = body["data"]["id"].as_str().unwrap().parse().unwrap();

    (order_id, warehouse.id, milk.id, bread.id)
}

async fn stock_row(app: &TestApp, warehouse_id: Uuid, product_id: Uuid) -> warehouse_stock::Model {
    warehouse_stock::Entity::find()
        .filter(warehouse_stock::Column::WarehouseId.eq(warehouse_id))
        .filter(warehouse_stock::Column::ProductId.eq(product_id))
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn creation_reserves_every_line() {
    let app = TestApp::new().await;
    let (order_id, warehouse_id, milk_id, bread_id) = seed_order(&app, true).await;

    let detail = app
        .state
        .services
        .pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap();

    assert_eq!(detail.task.status, "new");
    assert_eq!(detail.items.len(), 2);
    assert!(detail.items.iter().all(|i| i.picked_qty == 0));

    assert_eq!(stock_row(&app, warehouse_id, milk_id).await.reserved_quantity, 2);
    assert_eq!(stock_row(&app, warehouse_id, bread_id).await.reserved_quantity, 3);
}

#[tokio::test]
async fn shortage_on_any_line_rolls_the_whole_creation_back() {
    let app = TestApp::new().await;
    // Bread has no stock, so the second line cannot be reserved.
    let (order_id, warehouse_id, milk_id, _bread_id) = seed_order(&app, false).await;

    let err = app
        .state
        .services
        .pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // No task row survives and the milk reservation was rolled back too.
    let tasks = pick_task::Entity::find()
        .filter(pick_task::Column::OrderId.eq(order_id))
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert!(tasks.is_empty());
    assert_eq!(stock_row(&app, warehouse_id, milk_id).await.reserved_quantity, 0);
}

#[tokio::test]
async fn one_active_task_per_order() {
    let app = TestApp::new().await;
    let (order_id, warehouse_id, ..) = seed_order(&app, true).await;
    let pick_tasks = &app.state.services.pick_tasks;

    pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap();

    let err = pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateActiveTask(_)));
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancelling_frees_the_order_for_a_new_task() {
    let app = TestApp::new().await;
    let (order_id, warehouse_id, milk_id, ..) = seed_order(&app, true).await;
    let pick_tasks = &app.state.services.pick_tasks;

    let first = pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    pick_tasks
        .transition(first.task.id, PickTaskStatus::Cancelled, None, SYSTEM_ACTOR)
        .await
        .unwrap();

    // Cancellation released the reservations, so a replacement task can
    // re-reserve the same stock.
    assert_eq!(stock_row(&app, warehouse_id, milk_id).await.reserved_quantity, 0);
    let second = pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    assert_ne!(second.task.id, first.task.id);
    assert_eq!(stock_row(&app, warehouse_id, milk_id).await.reserved_quantity, 2);
}

#[tokio::test]
async fn done_commits_requested_quantities() {
    let app = TestApp::new().await;
    let (order_id, warehouse_id, milk_id, bread_id) = seed_order(&app, true).await;
    let pick_tasks = &app.state.services.pick_tasks;

    let detail = pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap();

    let in_progress = pick_tasks
        .transition(detail.task.id, PickTaskStatus::InProgress, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    assert!(in_progress.task.started_at.is_some());

    let done = pick_tasks
        .transition(detail.task.id, PickTaskStatus::Done, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    assert!(done.task.completed_at.is_some());
    assert!(done.items.iter().all(|i| i.picked_qty == i.requested_qty));

    // Physical stock and reservations both dropped by the picked amounts.
    let milk = stock_row(&app, warehouse_id, milk_id).await;
    assert_eq!((milk.quantity, milk.reserved_quantity), (8, 0));
    let bread = stock_row(&app, warehouse_id, bread_id).await;
    assert_eq!((bread.quantity, bread.reserved_quantity), (7, 0));
}

#[tokio::test]
async fn started_at_is_stamped_once() {
    let app = TestApp::new().await;
    let (order_id, warehouse_id, ..) = seed_order(&app, true).await;
    let pick_tasks = &app.state.services.pick_tasks;

    let detail = pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    let first = pick_tasks
        .transition(detail.task.id, PickTaskStatus::InProgress, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    let second = pick_tasks
        .transition(detail.task.id, PickTaskStatus::InProgress, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    assert_eq!(first.task.started_at, second.task.started_at);
}

#[tokio::test]
async fn terminal_tasks_are_immutable_but_idempotent() {
    let app = TestApp::new().await;
    let (order_id, warehouse_id, milk_id, ..) = seed_order(&app, true).await;
    let pick_tasks = &app.state.services.pick_tasks;

    let detail = pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    pick_tasks
        .transition(detail.task.id, PickTaskStatus::Done, None, SYSTEM_ACTOR)
        .await
        .unwrap();

    // Re-requesting the terminal status is a no-op, with no extra ledger
    // effect.
    let before = stock_row(&app, warehouse_id, milk_id).await;
    let repeat = pick_tasks
        .transition(detail.task.id, PickTaskStatus::Done, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    assert_eq!(repeat.task.status, "done");
    let after = stock_row(&app, warehouse_id, milk_id).await;
    assert_eq!(before.quantity, after.quantity);

    // Any other target is refused.
    let err = pick_tasks
        .transition(detail.task.id, PickTaskStatus::Cancelled, None, SYSTEM_ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TerminalTaskImmutable(_)));
}

#[tokio::test]
async fn no_way_back_to_new() {
    let app = TestApp::new().await;
    let (order_id, warehouse_id, ..) = seed_order(&app, true).await;
    let pick_tasks = &app.state.services.pick_tasks;

    let detail = pick_tasks
        .create_for_order(order_id, warehouse_id, None, SYSTEM_ACTOR)
        .await
        .unwrap();
    pick_tasks
        .transition(detail.task.id, PickTaskStatus::InProgress, None, SYSTEM_ACTOR)
        .await
        .unwrap();

    let err = pick_tasks
        .transition(detail.task.id, PickTaskStatus::New, None, SYSTEM_ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn pick_task_http_surface_is_permission_gated() {
    let app = TestApp::new().await;
    let (order_id, warehouse_id, ..) = seed_order(&app, true).await;

    let body = json!({ "order_id": order_id, "warehouse_id": warehouse_id });

    let courier = app.token_for(Uuid::new_v4(), "courier", &[]);
    let response = app
        .request(
            Method::POST,
            "/api/v1/admin/pick-tasks/from-order",
            Some(body.clone()),
            Some(&courier),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let staff = app.token_for(Uuid::new_v4(), "staff", &["manage_warehouse"]);
    let response = app
        .request(
            Method::POST,
            "/api/v1/admin/pick-tasks/from-order",
            Some(body),
            Some(&staff),
        )
        .await;
    let (status, json) = read_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = json["data"]["id"].as_str().unwrap().to_string();

    // Walk the task to done over HTTP.
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/admin/pick-tasks/{task_id}"),
            Some(json!({ "status": "in_progress" })),
            Some(&staff),
        )
        .await;
    let (status, json) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "in_progress");

    let response = app
        .request(
            Method::GET,
            "/api/v1/admin/pick-tasks?status=in_progress",
            None,
            Some(&staff),
        )
        .await;
    let (status, json) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}
