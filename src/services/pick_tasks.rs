use crate::{
    db::{apply_statement_timeout, lock_for_update, DbPool},
    entities::{
        order::{self, Entity as Order},
        order_item::{self, Entity as OrderItem},
        pick_task::{self, Entity as PickTask},
        pick_task_item::{self, Entity as PickTaskItem},
    },
    errors::{map_lock_err, ServiceError},
    events::{Event, EventSender},
    models::status::{MovementType, PickTaskStatus},
    services::stock_ledger::{self, unwrap_txn_err},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// A pick task together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct PickTaskDetail {
    #[serde(flatten)]
    pub task: pick_task::Model,
    pub items: Vec<pick_task_item::Model>,
}

/// Turns an order's line items into warehouse pick work, reserving stock on
/// creation and committing or releasing it as the task progresses.
#[derive(Clone)]
pub struct PickTaskService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    statement_timeout: Duration,
}

impl PickTaskService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        statement_timeout: Duration,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            statement_timeout,
        }
    }

    /// Creates a pick task for an order, reserving every line item. Any
    /// shortage aborts the whole creation; no partial reservation survives.
    #[instrument(skip(self), fields(order_id = %order_id, warehouse_id = %warehouse_id))]
    pub async fn create_for_order(
        &self,
        order_id: Uuid,
        warehouse_id: Uuid,
        assignee_id: Option<Uuid>,
        actor_id: Uuid,
    ) -> Result<PickTaskDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let timeout = self.statement_timeout;

        let detail = db
            .transaction::<_, PickTaskDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    apply_statement_timeout(txn, timeout)
                        .await
                        .map_err(map_lock_err)?;
                    Order::find_by_id(order_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {order_id} not found"))
                        })?;

                    let active_exists = PickTask::find()
                        .filter(pick_task::Column::OrderId.eq(order_id))
                        .filter(
                            pick_task::Column::Status
                                .is_in(PickTaskStatus::ACTIVE.map(|s| s.to_string())),
                        )
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;
                    if active_exists.is_some() {
                        return Err(ServiceError::DuplicateActiveTask(order_id));
                    }

                    let lines = OrderItem::find()
                        .filter(order_item::Column::OrderId.eq(order_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;
                    if lines.is_empty() {
                        return Err(ServiceError::ValidationError(format!(
                            "order {order_id} has no line items to pick"
                        )));
                    }

                    let task_id = Uuid::new_v4();
                    let task = pick_task::ActiveModel {
                        id: Set(task_id),
                        order_id: Set(order_id),
                        warehouse_id: Set(warehouse_id),
                        status: Set(PickTaskStatus::New.to_string()),
                        assignee_id: Set(assignee_id),
                        created_by: Set(actor_id),
                        created_at: Set(Utc::now()),
                        started_at: Set(None),
                        completed_at: Set(None),
                    };
                    let task = task.insert(txn).await.map_err(ServiceError::DatabaseError)?;

                    let mut items = Vec::with_capacity(lines.len());
                    for line in &lines {
                        // A failed reservation propagates out and rolls the
                        // whole transaction back, task row included.
                        stock_ledger::apply_movement(
                            txn,
                            warehouse_id,
                            line.product_id,
                            MovementType::Reserve,
                            line.quantity,
                            Some(format!("pick task for order {order_id}")),
                            Some(("pick_task", task_id)),
                            actor_id,
                        )
                        .await?;

                        let item = pick_task_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            pick_task_id: Set(task_id),
                            product_id: Set(line.product_id),
                            product_name: Set(line.name.clone()),
                            requested_qty: Set(line.quantity),
                            picked_qty: Set(0),
                        };
                        items.push(
                            item.insert(txn).await.map_err(ServiceError::DatabaseError)?,
                        );
                    }

                    Ok(PickTaskDetail { task, items })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(task_id = %detail.task.id, items = detail.items.len(), "pick task created");
        self.event_sender.send_best_effort(Event::PickTaskCreated {
            task_id: detail.task.id,
            order_id,
        });

        Ok(detail)
    }

    /// Moves a task through its lifecycle. Ledger effects (commit on done,
    /// release on cancel) happen in the same transaction as the status
    /// write; a ledger failure aborts the whole transition.
    #[instrument(skip(self), fields(task_id = %task_id, target = %target))]
    pub async fn transition(
        &self,
        task_id: Uuid,
        target: PickTaskStatus,
        assignee_id: Option<Uuid>,
        actor_id: Uuid,
    ) -> Result<PickTaskDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let timeout = self.statement_timeout;

        let detail = db
            .transaction::<_, PickTaskDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    apply_statement_timeout(txn, timeout)
                        .await
                        .map_err(map_lock_err)?;
                    apply_transition(txn, task_id, target, assignee_id, actor_id).await
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        self.event_sender
            .send_best_effort(Event::PickTaskTransitioned {
                task_id,
                new_status: detail.task.status.clone(),
            });

        Ok(detail)
    }

    pub async fn get(&self, task_id: Uuid) -> Result<PickTaskDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let task = PickTask::find_by_id(task_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Pick task {task_id} not found")))?;
        let items = PickTaskItem::find()
            .filter(pick_task_item::Column::PickTaskId.eq(task_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(PickTaskDetail { task, items })
    }

    /// Newest first; optionally narrowed to one status.
    pub async fn list(
        &self,
        status: Option<PickTaskStatus>,
    ) -> Result<Vec<pick_task::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        let mut query = PickTask::find().order_by_desc(pick_task::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(pick_task::Column::Status.eq(status.to_string()));
        }
        query.all(db).await.map_err(ServiceError::DatabaseError)
    }
}

async fn apply_transition<C: ConnectionTrait>(
    txn: &C,
    task_id: Uuid,
    target: PickTaskStatus,
    assignee_id: Option<Uuid>,
    actor_id: Uuid,
) -> Result<PickTaskDetail, ServiceError> {
    let backend = txn.get_database_backend();
    let task = lock_for_update(PickTask::find_by_id(task_id), backend)
        .one(txn)
        .await
        .map_err(map_lock_err)?
        .ok_or_else(|| ServiceError::NotFound(format!("Pick task {task_id} not found")))?;

    let current: PickTaskStatus = task
        .status
        .parse()
        .map_err(|_| ServiceError::InternalError(format!("corrupt task status '{}'", task.status)))?;

    let items = PickTaskItem::find()
        .filter(pick_task_item::Column::PickTaskId.eq(task_id))
        .all(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    if current.is_terminal() {
        // Re-requesting the status the task already ended in is an
        // idempotent no-op; anything else is refused.
        if target == current {
            return Ok(PickTaskDetail { task, items });
        }
        return Err(ServiceError::TerminalTaskImmutable(task_id));
    }

    let mut active: pick_task::ActiveModel = task.clone().into();
    if let Some(assignee) = assignee_id {
        active.assignee_id = Set(Some(assignee));
    }

    match target {
        PickTaskStatus::New => {
            return Err(ServiceError::Conflict(format!(
                "pick task {task_id} cannot move back to 'new'"
            )));
        }
        PickTaskStatus::InProgress => {
            // Stamped once, on first entry only.
            if task.started_at.is_none() {
                active.started_at = Set(Some(Utc::now()));
            }
        }
        PickTaskStatus::Done => {
            for item in &items {
                // The full requested quantity is committed; picked_qty
                // tracking does not alter the ledger effect here.
                stock_ledger::apply_movement(
                    txn,
                    task.warehouse_id,
                    item.product_id,
                    MovementType::Pick,
                    item.requested_qty,
                    None,
                    Some(("pick_task", task_id)),
                    actor_id,
                )
                .await?;

                let mut item_active: pick_task_item::ActiveModel = item.clone().into();
                item_active.picked_qty = Set(item.requested_qty);
                item_active
                    .update(txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
            }
            active.completed_at = Set(Some(Utc::now()));
        }
        PickTaskStatus::Cancelled => {
            for item in &items {
                stock_ledger::apply_movement(
                    txn,
                    task.warehouse_id,
                    item.product_id,
                    MovementType::Release,
                    item.requested_qty,
                    None,
                    Some(("pick_task", task_id)),
                    actor_id,
                )
                .await?;
            }
            active.completed_at = Set(Some(Utc::now()));
        }
    }

    active.status = Set(target.to_string());
    let task = active.update(txn).await.map_err(ServiceError::DatabaseError)?;

    let items = PickTaskItem::find()
        .filter(pick_task_item::Column::PickTaskId.eq(task_id))
        .all(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    info!(task_id = %task_id, from = %current, to = %target, "pick task transitioned");

    Ok(PickTaskDetail { task, items })
}
