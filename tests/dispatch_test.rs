mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

use freshline_api::entities::{order, order_event};
use freshline_api::errors::ServiceError;

use common::{read_json, TestApp};

const ADDRESS: &str = "Springfield, Baker Street, 21";

/// Places an order for a fresh customer and returns its id.
async fn place_order(app: &TestApp) -> Uuid {
    let product = app.seed_product("Milk 1L", dec!(1.89)).await;
    let customer_id = Uuid::new_v4();
    app.seed_cart_item(customer_id, product.id, 1).await;
    let token = app.token_for(customer_id, "customer", &[]);
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "delivery_address": ADDRESS })),
            Some(&token),
        )
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().parse().unwrap()
}

async fn order_row(app: &TestApp, order_id: Uuid) -> order::Model {
    order::Entity::find_by_id(order_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn least_loaded_courier_wins_with_id_tiebreak() {
    let app = TestApp::new().await;

    // Two available couriers; give the first one an active order so the
    // second is strictly less loaded.
    let first = app.seed_courier(Uuid::new_v4(), "available", 5).await;
    let second = app.seed_courier(Uuid::new_v4(), "available", 5).await;

    let busy_order = place_order(&app).await;
    let assigned_to = order_row(&app, busy_order).await.courier_id.unwrap();
    let (loaded, idle) = if assigned_to == first.id {
        (first, second)
    } else {
        (second, first)
    };

    let next_order = place_order(&app).await;
    assert_eq!(order_row(&app, next_order).await.courier_id, Some(idle.id));

    // With both at equal load again, the smaller courier id wins.
    let third_order = place_order(&app).await;
    let expected = std::cmp::min(loaded.id, idle.id);
    assert_eq!(order_row(&app, third_order).await.courier_id, Some(expected));
}

#[tokio::test]
async fn couriers_at_capacity_are_skipped() {
    let app = TestApp::new().await;
    app.seed_courier(Uuid::new_v4(), "available", 1).await;

    let first = place_order(&app).await;
    assert!(order_row(&app, first).await.courier_id.is_some());

    // The only courier is full now; the next order stays pending.
    let second = place_order(&app).await;
    let row = order_row(&app, second).await;
    assert_eq!(row.status, "pending");
    assert!(row.courier_id.is_none());
}

#[tokio::test]
async fn unverified_and_offline_couriers_never_get_orders() {
    let app = TestApp::new().await;
    app.seed_courier_with_verification(Uuid::new_v4(), "available", 5, "pending")
        .await;
    app.seed_courier(Uuid::new_v4(), "offline", 5).await;

    let order_id = place_order(&app).await;
    let row = order_row(&app, order_id).await;
    assert_eq!(row.status, "pending");
    assert!(row.courier_id.is_none());
}

#[tokio::test]
async fn connecting_as_available_backfills_the_oldest_pending_order() {
    let app = TestApp::new().await;
    let first = place_order(&app).await;
    let second = place_order(&app).await;

    let courier_user = Uuid::new_v4();
    app.seed_courier(courier_user, "offline", 1).await;

    let token = app.token_for(courier_user, "courier", &[]);
    let response = app
        .request(
            Method::POST,
            "/api/v1/couriers/connect",
            Some(json!({ "status": "available" })),
            Some(&token),
        )
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "available");

    // One slot, so exactly the older order got picked up.
    assert_eq!(order_row(&app, first).await.status, "assigned");
    assert_eq!(order_row(&app, second).await.status, "pending");
}

#[tokio::test]
async fn delivering_frees_a_slot_and_backfills() {
    let app = TestApp::new().await;
    let courier_user = Uuid::new_v4();
    app.seed_courier(courier_user, "available", 1).await;

    let first = place_order(&app).await;
    assert_eq!(order_row(&app, first).await.status, "assigned");
    let waiting = place_order(&app).await;
    assert_eq!(order_row(&app, waiting).await.status, "pending");

    let courier = app.token_for(courier_user, "courier", &[]);
    for target in ["picked_up", "on_the_way", "delivered"] {
        let response = app
            .request(
                Method::PATCH,
                &format!("/api/v1/orders/{first}/status"),
                Some(json!({ "status": target })),
                Some(&courier),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The terminal transition backfilled the queue into the freed slot.
    assert_eq!(order_row(&app, waiting).await.status, "assigned");
}

#[tokio::test]
async fn manual_claim_is_first_come_first_served() {
    let app = TestApp::new().await;
    let order_id = place_order(&app).await;

    let winner_user = Uuid::new_v4();
    let loser_user = Uuid::new_v4();
    // Both offline so neither was auto-assigned on creation.
    let winner = app.seed_courier(winner_user, "offline", 3).await;
    app.seed_courier(loser_user, "offline", 3).await;

    let winner_token = app.token_for(winner_user, "courier", &[]);
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/claim"),
            None,
            Some(&winner_token),
        )
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["courier_id"], winner.id.to_string());

    // The order left the pending pool; a second claim loses.
    let loser_token = app.token_for(loser_user, "courier", &[]);
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/claim"),
            None,
            Some(&loser_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The assignment never moved.
    assert_eq!(order_row(&app, order_id).await.courier_id, Some(winner.id));
}

#[tokio::test]
async fn simultaneous_claims_award_the_order_exactly_once() {
    let app = TestApp::new().await;
    let order_id = place_order(&app).await;

    let first_user = Uuid::new_v4();
    let second_user = Uuid::new_v4();
    // Both offline so neither was auto-assigned on creation.
    let first = app.seed_courier(first_user, "offline", 3).await;
    let second = app.seed_courier(second_user, "offline", 3).await;

    let dispatch = app.state.services.dispatch.clone();
    let (a, b) = tokio::join!(
        dispatch.claim(order_id, first_user),
        dispatch.claim(order_id, second_user),
    );

    // Exactly one claim lands; the other sees the order gone.
    assert!(a.is_ok() != b.is_ok(), "got {a:?} and {b:?}");
    let (winner, loser) = if a.is_ok() {
        (a.unwrap(), b.unwrap_err())
    } else {
        (b.unwrap(), a.unwrap_err())
    };
    assert!(matches!(loser, ServiceError::OrderUnavailable(_)));
    assert!(winner.id == first.id || winner.id == second.id);

    // The row carries the winner and never moved again.
    let row = order_row(&app, order_id).await;
    assert_eq!(row.status, "assigned");
    assert_eq!(row.courier_id, Some(winner.id));

    // One "assigned" event, not two.
    let assigned_events = order_event::Entity::find()
        .filter(order_event::Column::OrderId.eq(order_id))
        .filter(order_event::Column::Status.eq("assigned"))
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(assigned_events.len(), 1);
}

#[tokio::test]
async fn unverified_courier_cannot_claim() {
    let app = TestApp::new().await;
    let order_id = place_order(&app).await;

    let courier_user = Uuid::new_v4();
    app.seed_courier_with_verification(courier_user, "available", 3, "submitted")
        .await;

    let token = app.token_for(courier_user, "courier", &[]);
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/claim"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn open_pool_lists_only_unclaimed_pending_orders() {
    let app = TestApp::new().await;
    let courier_user = Uuid::new_v4();
    app.seed_courier(courier_user, "offline", 3).await;

    let first = place_order(&app).await;
    let second = place_order(&app).await;

    let token = app.token_for(courier_user, "courier", &[]);
    app.request(
        Method::POST,
        &format!("/api/v1/orders/{first}/claim"),
        None,
        Some(&token),
    )
    .await;

    let response = app
        .request(Method::GET, "/api/v1/orders/open", None, Some(&token))
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    let open = body["data"].as_array().unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["id"], second.to_string());
}
