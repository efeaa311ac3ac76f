use crate::{
    auth::{consts as perm, CurrentUser, Role},
    db::DbPool,
    entities::{
        cart_item::{self, Entity as CartItem},
        courier::{self, Entity as Courier},
        order::{self, Entity as Order},
        order_event::{self, Entity as OrderEvent},
        order_item::{self, Entity as OrderItem},
        product::Entity as Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        address::{parse_delivery_address, validate_coordinates},
        status::{order_transition_allowed, OrderActor, OrderStatus},
    },
    services::{dispatch::DispatchService, stock_ledger::unwrap_txn_err},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Delivery address is required"))]
    pub delivery_address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// An order with its frozen line items and event trail.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub events: Vec<order_event::Model>,
}

/// The central order state machine: creation from the cart, role-gated
/// status transitions and the dispatch hooks around them.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    dispatch: Arc<DispatchService>,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        dispatch: Arc<DispatchService>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            dispatch,
        }
    }

    /// Creates an order from the customer's cart: snapshots lines (name and
    /// price frozen), totals them at two decimals, empties the cart and
    /// logs the `pending` event, all in one transaction. Auto-assignment
    /// runs after commit as a best-effort follow-up.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderDetail, ServiceError> {
        request.validate()?;
        let address = parse_delivery_address(&request.delivery_address)?;
        let coords = validate_coordinates(request.lat, request.lng)?;

        let db = self.db_pool.as_ref();
        let raw_address = request.delivery_address.trim().to_string();

        let order_id = db
            .transaction::<_, Uuid, ServiceError>(move |txn| {
                Box::pin(async move {
                    let cart_lines = CartItem::find()
                        .filter(cart_item::Column::UserId.eq(user_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;
                    if cart_lines.is_empty() {
                        return Err(ServiceError::ValidationError(
                            "cart is empty, nothing to order".into(),
                        ));
                    }

                    let now = Utc::now();
                    let order_id = Uuid::new_v4();
                    let mut total = Decimal::ZERO;
                    let mut items = Vec::with_capacity(cart_lines.len());

                    for line in &cart_lines {
                        let product = Product::find_by_id(line.product_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::DatabaseError)?
                            .ok_or_else(|| {
                                ServiceError::ValidationError(format!(
                                    "cart references unknown product {}",
                                    line.product_id
                                ))
                            })?;

                        total += product.price * Decimal::from(line.quantity);

                        let item = order_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            order_id: Set(order_id),
                            product_id: Set(product.id),
                            name: Set(product.name.clone()),
                            quantity: Set(line.quantity),
                            unit_price: Set(product.price),
                            created_at: Set(now),
                        };
                        items.push(item);
                    }

                    let new_order = order::ActiveModel {
                        id: Set(order_id),
                        user_id: Set(user_id),
                        status: Set(OrderStatus::Pending.to_string()),
                        total_amount: Set(total.round_dp(2)),
                        delivery_address: Set(raw_address),
                        delivery_lat: Set(coords.map(|(lat, _)| lat)),
                        delivery_lng: Set(coords.map(|(_, lng)| lng)),
                        courier_id: Set(None),
                        created_at: Set(now),
                        updated_at: Set(Some(now)),
                    };
                    new_order.insert(txn).await.map_err(ServiceError::DatabaseError)?;

                    // Parent row first so the order_items FK holds.
                    for item in items {
                        item.insert(txn).await.map_err(ServiceError::DatabaseError)?;
                    }

                    CartItem::delete_many()
                        .filter(cart_item::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                    let created_event = order_event::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        order_id: Set(order_id),
                        status: Set(OrderStatus::Pending.to_string()),
                        comment: Set(Some("created".into())),
                        actor_id: Set(user_id),
                        created_at: Set(now),
                    };
                    created_event
                        .insert(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                    Ok(order_id)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(order_id = %order_id, locality = %address.locality, "order created");
        self.event_sender
            .send_best_effort(Event::OrderCreated(order_id));

        // Best-effort dispatch; a failure here must never undo the order.
        if let Err(err) = self.dispatch.assign_if_possible(order_id).await {
            warn!(order_id = %order_id, error = %err, "auto-assignment after creation failed");
        }

        self.detail(order_id).await
    }

    /// Role-gated status transition. Writes the new status together with
    /// its order event; a terminal target then backfills the dispatch
    /// queue, best-effort.
    #[instrument(skip(self, user), fields(order_id = %order_id, target = %target, actor = %user.user_id))]
    pub async fn set_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        user: &CurrentUser,
        comment: Option<String>,
    ) -> Result<OrderDetail, ServiceError> {
        let db = self.db_pool.as_ref();

        let existing = Order::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let current: OrderStatus = existing.status.parse().map_err(|_| {
            ServiceError::InternalError(format!("corrupt order status '{}'", existing.status))
        })?;

        let actor = self.resolve_actor(&existing, user).await?;
        if !order_transition_allowed(actor, current, target) {
            return Err(ServiceError::ForbiddenTransition(format!(
                "{} -> {} is not allowed for this actor",
                current, target
            )));
        }

        let actor_id = user.user_id;
        let old_status = existing.status.clone();
        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let mut active: order::ActiveModel = existing.into();
                active.status = Set(target.to_string());
                active.updated_at = Set(Some(Utc::now()));
                active.update(txn).await.map_err(ServiceError::DatabaseError)?;

                let event = order_event::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    status: Set(target.to_string()),
                    comment: Set(comment),
                    actor_id: Set(actor_id),
                    created_at: Set(Utc::now()),
                };
                event.insert(txn).await.map_err(ServiceError::DatabaseError)?;
                Ok(())
            })
        })
        .await
        .map_err(unwrap_txn_err)?;

        info!(from = %old_status, to = %target, "order status changed");
        self.event_sender
            .send_best_effort(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status: target.to_string(),
            });

        if target.is_terminal() {
            // A courier slot just opened up (or the order left the queue);
            // give the oldest pending order a chance.
            if let Err(err) = self.dispatch.try_assign_oldest_pending().await {
                warn!(error = %err, "dispatch backfill after terminal transition failed");
            }
        }

        self.detail(order_id).await
    }

    /// Maps the authenticated principal onto the state machine's actor,
    /// enforcing ownership/assignment and courier eligibility.
    async fn resolve_actor(
        &self,
        order: &order::Model,
        user: &CurrentUser,
    ) -> Result<OrderActor, ServiceError> {
        match user.role {
            Role::Customer => {
                if order.user_id != user.user_id {
                    return Err(ServiceError::Forbidden(
                        "customers may only manage their own orders".into(),
                    ));
                }
                Ok(OrderActor::Owner)
            }
            Role::Courier => {
                let courier = self.courier_for_user(user.user_id).await?;
                if !courier.is_eligible() {
                    return Err(ServiceError::Forbidden(
                        "courier is not verified for deliveries".into(),
                    ));
                }
                if order.courier_id != Some(courier.id) {
                    return Err(ServiceError::Forbidden(
                        "order is not assigned to this courier".into(),
                    ));
                }
                Ok(OrderActor::AssignedCourier)
            }
            Role::Staff | Role::Admin => {
                user.require_permission(perm::ORDERS_MANAGE)?;
                Ok(OrderActor::Manager)
            }
        }
    }

    async fn courier_for_user(&self, user_id: Uuid) -> Result<courier::Model, ServiceError> {
        Courier::find()
            .filter(courier::Column::UserId.eq(user_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("No courier profile for user {user_id}")))
    }

    pub async fn detail(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let order = Order::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let items = order
            .find_related(OrderItem)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let events = order
            .find_related(OrderEvent)
            .order_by_asc(order_event::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(OrderDetail {
            order,
            items,
            events,
        })
    }

    /// Single-order read subject to visibility rules: the owner, the
    /// assigned courier, or staff with the management permission.
    pub async fn detail_for(
        &self,
        order_id: Uuid,
        user: &CurrentUser,
    ) -> Result<OrderDetail, ServiceError> {
        let detail = self.detail(order_id).await?;

        let visible = match user.role {
            Role::Customer => detail.order.user_id == user.user_id,
            Role::Courier => {
                let courier = self.courier_for_user(user.user_id).await?;
                detail.order.courier_id == Some(courier.id)
            }
            Role::Staff | Role::Admin => user.has_permission(perm::ORDERS_MANAGE),
        };

        if !visible {
            return Err(ServiceError::Forbidden(
                "order is not visible to this account".into(),
            ));
        }
        Ok(detail)
    }

    pub async fn list_for_customer(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Active orders currently assigned to the courier behind this user.
    pub async fn list_assigned(&self, courier_user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        let courier = self.courier_for_user(courier_user_id).await?;
        Order::find()
            .filter(order::Column::CourierId.eq(courier.id))
            .filter(order::Column::Status.is_in(OrderStatus::ACTIVE_LOAD.map(|s| s.to_string())))
            .order_by_asc(order::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// The open pool: pending, unassigned, oldest first.
    pub async fn list_open(&self) -> Result<Vec<order::Model>, ServiceError> {
        Order::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()))
            .filter(order::Column::CourierId.is_null())
            .order_by_asc(order::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn list_all(&self) -> Result<Vec<order::Model>, ServiceError> {
        Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
