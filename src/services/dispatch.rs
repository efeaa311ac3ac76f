use crate::{
    db::DbPool,
    entities::{
        courier::{self, Entity as Courier},
        order::{self, Entity as Order},
        order_event,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::status::{CourierStatus, OrderStatus},
    services::stock_ledger::unwrap_txn_err,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Actor recorded on order events produced by automatic dispatch.
pub const SYSTEM_ACTOR: Uuid = Uuid::nil();

/// Picks the least-loaded eligible courier for pending orders and claims
/// orders on couriers' behalf. The claim itself is a compare-and-swap on the
/// order row: only one caller can ever flip a given order from pending and
/// unassigned to assigned.
#[derive(Clone)]
pub struct DispatchService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl DispatchService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Number of orders currently counting against a courier's capacity.
    pub async fn active_load<C: ConnectionTrait>(
        &self,
        db: &C,
        courier_id: Uuid,
    ) -> Result<u64, ServiceError> {
        Order::find()
            .filter(order::Column::CourierId.eq(courier_id))
            .filter(order::Column::Status.is_in(OrderStatus::ACTIVE_LOAD.map(|s| s.to_string())))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Tries to hand the order to the least-loaded available, eligible
    /// courier with spare capacity. Ties break on smallest courier id so
    /// dispatch stays deterministic. Returns `None` (order stays pending)
    /// when nobody qualifies or another caller won the race.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn assign_if_possible(
        &self,
        order_id: Uuid,
    ) -> Result<Option<courier::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        let candidates = Courier::find()
            .filter(courier::Column::Status.eq(CourierStatus::Available.to_string()))
            .order_by_asc(courier::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut best: Option<(u64, courier::Model)> = None;
        for candidate in candidates {
            if !candidate.is_eligible() {
                continue;
            }
            let load = self.active_load(db, candidate.id).await?;
            if load >= candidate.max_active_orders.max(0) as u64 {
                continue;
            }
            // Strictly-less keeps the first (smallest id) candidate on ties.
            if best.as_ref().map_or(true, |(min, _)| load < *min) {
                best = Some((load, candidate));
            }
        }

        let Some((load, chosen)) = best else {
            debug!("no eligible courier with capacity, order stays pending");
            return Ok(None);
        };

        if !self
            .claim_cas(db, order_id, &chosen, "auto-assigned", SYSTEM_ACTOR)
            .await?
        {
            // Lost the race to a concurrent dispatcher or manual claim.
            debug!("order no longer pending/unassigned, skipping");
            return Ok(None);
        }

        info!(courier_id = %chosen.id, load, "order auto-assigned");
        self.event_sender.send_best_effort(Event::OrderAssigned {
            order_id,
            courier_id: chosen.id,
        });
        Ok(Some(chosen))
    }

    /// Backfills the dispatch queue: takes the single oldest pending
    /// unassigned order, if any, and runs [`assign_if_possible`] on it.
    /// Eager and greedy, one order per trigger; not a batch scheduler.
    #[instrument(skip(self))]
    pub async fn try_assign_oldest_pending(&self) -> Result<Option<courier::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        let oldest = Order::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()))
            .filter(order::Column::CourierId.is_null())
            .order_by_asc(order::Column::CreatedAt)
            .order_by_asc(order::Column::Id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match oldest {
            Some(order) => self.assign_if_possible(order.id).await,
            None => Ok(None),
        }
    }

    /// Manual self-assignment by a courier. Requires eligibility and spare
    /// capacity; fails with `OrderUnavailable` when the order was taken (or
    /// otherwise left the pending pool) in the meantime.
    #[instrument(skip(self), fields(order_id = %order_id, courier_user_id = %courier_user_id))]
    pub async fn claim(
        &self,
        order_id: Uuid,
        courier_user_id: Uuid,
    ) -> Result<courier::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        let courier = Courier::find()
            .filter(courier::Column::UserId.eq(courier_user_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No courier profile for user {courier_user_id}"))
            })?;

        if !courier.is_eligible() {
            return Err(ServiceError::Forbidden(
                "courier is not verified for deliveries".into(),
            ));
        }

        let load = self.active_load(db, courier.id).await?;
        if load >= courier.max_active_orders.max(0) as u64 {
            return Err(ServiceError::Conflict(format!(
                "courier already has {load} active orders (limit {})",
                courier.max_active_orders
            )));
        }

        if !self
            .claim_cas(db, order_id, &courier, "manual claim", courier.user_id)
            .await?
        {
            return Err(ServiceError::OrderUnavailable(format!(
                "order {order_id} was already taken or is not pending"
            )));
        }

        info!(courier_id = %courier.id, "order claimed manually");
        self.event_sender.send_best_effort(Event::OrderAssigned {
            order_id,
            courier_id: courier.id,
        });
        Ok(courier)
    }

    /// The compare-and-swap: flip the order to `assigned` only if it is
    /// still pending and unassigned at commit time, and log the order event
    /// in the same transaction. Returns whether this caller won.
    async fn claim_cas(
        &self,
        db: &DbPool,
        order_id: Uuid,
        courier: &courier::Model,
        comment: &str,
        actor_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let courier_id = courier.id;
        let comment = comment.to_string();

        db.transaction::<_, bool, ServiceError>(move |txn| {
            Box::pin(async move {
                let result = Order::update_many()
                    .col_expr(
                        order::Column::Status,
                        Expr::value(OrderStatus::Assigned.to_string()),
                    )
                    .col_expr(order::Column::CourierId, Expr::value(courier_id))
                    .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(order::Column::Id.eq(order_id))
                    .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()))
                    .filter(order::Column::CourierId.is_null())
                    .exec(txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;

                if result.rows_affected == 0 {
                    return Ok(false);
                }

                let event = order_event::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    status: Set(OrderStatus::Assigned.to_string()),
                    comment: Set(Some(comment)),
                    actor_id: Set(actor_id),
                    created_at: Set(Utc::now()),
                };
                event.insert(txn).await.map_err(ServiceError::DatabaseError)?;

                Ok(true)
            })
        })
        .await
        .map_err(unwrap_txn_err)
    }
}
