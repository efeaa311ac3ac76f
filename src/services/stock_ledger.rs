use crate::{
    db::{apply_statement_timeout, lock_for_update, DbPool},
    entities::{
        product::{self, Entity as Product},
        stock_movement,
        warehouse_stock::{self, Entity as WarehouseStock},
    },
    errors::{map_lock_err, ServiceError},
    events::{Event, EventSender},
    models::status::MovementType,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// What a stock movement was made on behalf of (e.g. a pick task).
#[derive(Debug, Clone, Copy)]
pub struct MovementRef<'a> {
    pub ref_type: &'a str,
    pub ref_id: Uuid,
}

impl<'a> MovementRef<'a> {
    pub fn pick_task(id: Uuid) -> Self {
        Self {
            ref_type: "pick_task",
            ref_id: id,
        }
    }
}

/// Owns the per-warehouse quantity/reservation counters and the movement
/// log, and keeps the product-level aggregate in sync.
#[derive(Clone)]
pub struct StockLedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    statement_timeout: Duration,
}

impl StockLedgerService {
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

    /// Stock arriving at a warehouse.
    #[instrument(skip(self), fields(warehouse_id = %warehouse_id, product_id = %product_id))]
    pub async fn receive(
        &self,
        warehouse_id: Uuid,
        product_id: Uuid,
        qty: i32,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<warehouse_stock::Model, ServiceError> {
        self.mutate(
            warehouse_id,
            product_id,
            MovementType::Receive,
            qty,
            reason,
            None,
            actor_id,
        )
        .await
    }

    /// Physical removal of unreserved stock (spoilage, damage, shrinkage).
    #[instrument(skip(self), fields(warehouse_id = %warehouse_id, product_id = %product_id))]
    pub async fn writeoff(
        &self,
        warehouse_id: Uuid,
        product_id: Uuid,
        qty: i32,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<warehouse_stock::Model, ServiceError> {
        self.mutate(
            warehouse_id,
            product_id,
            MovementType::Writeoff,
            qty,
            reason,
            None,
            actor_id,
        )
        .await
    }

    /// Claims stock without removing it physically.
    #[instrument(skip(self), fields(warehouse_id = %warehouse_id, product_id = %product_id))]
    pub async fn reserve(
        &self,
        warehouse_id: Uuid,
        product_id: Uuid,
        qty: i32,
        reason: Option<String>,
        reference: Option<MovementRef<'_>>,
        actor_id: Uuid,
    ) -> Result<warehouse_stock::Model, ServiceError> {
        self.mutate(
            warehouse_id,
            product_id,
            MovementType::Reserve,
            qty,
            reason,
            reference,
            actor_id,
        )
        .await
    }

    /// Returns reserved stock to the available pool.
    #[instrument(skip(self), fields(warehouse_id = %warehouse_id, product_id = %product_id))]
    pub async fn release(
        &self,
        warehouse_id: Uuid,
        product_id: Uuid,
        qty: i32,
        reference: Option<MovementRef<'_>>,
        actor_id: Uuid,
    ) -> Result<warehouse_stock::Model, ServiceError> {
        self.mutate(
            warehouse_id,
            product_id,
            MovementType::Release,
            qty,
            None,
            reference,
            actor_id,
        )
        .await
    }

    /// Physical removal of already-reserved stock (the pick).
    #[instrument(skip(self), fields(warehouse_id = %warehouse_id, product_id = %product_id))]
    pub async fn commit_pick(
        &self,
        warehouse_id: Uuid,
        product_id: Uuid,
        qty: i32,
        reference: Option<MovementRef<'_>>,
        actor_id: Uuid,
    ) -> Result<warehouse_stock::Model, ServiceError> {
        self.mutate(
            warehouse_id,
            product_id,
            MovementType::Pick,
            qty,
            None,
            reference,
            actor_id,
        )
        .await
    }

    /// One ledger operation: a transaction around the locked
    /// read-modify-write, the movement log insert and the aggregate
    /// recompute. Either all of it commits or none of it does.
    async fn mutate(
        &self,
        warehouse_id: Uuid,
        product_id: Uuid,
        movement: MovementType,
        qty: i32,
        reason: Option<String>,
        reference: Option<MovementRef<'_>>,
        actor_id: Uuid,
    ) -> Result<warehouse_stock::Model, ServiceError> {
        let reference = reference.map(|r| (r.ref_type.to_string(), r.ref_id));
        let db = self.db_pool.as_ref();
        let timeout = self.statement_timeout;

        let updated = db
            .transaction::<_, warehouse_stock::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    apply_statement_timeout(txn, timeout)
                        .await
                        .map_err(map_lock_err)?;
                    apply_movement(
                        txn,
                        warehouse_id,
                        product_id,
                        movement,
                        qty,
                        reason,
                        reference.as_ref().map(|(t, id)| (t.as_str(), *id)),
                        actor_id,
                    )
                    .await
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            movement = %movement,
            qty,
            quantity = updated.quantity,
            reserved = updated.reserved_quantity,
            "ledger movement applied"
        );
        self.event_sender
            .send_best_effort(Event::StockMovementRecorded {
                warehouse_id,
                product_id,
                movement_type: movement.to_string(),
                quantity: qty,
            });

        Ok(updated)
    }
}

/// One line of the warehouse overview read model.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OverviewRow {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub available: i32,
    pub reorder_min: i32,
    pub reorder_target: i32,
    pub low_stock: bool,
    /// How much to order to get back to the reorder target.
    pub order_suggestion: i32,
}

impl StockLedgerService {
    /// Stock position across all warehouses, with the low-stock derivation:
    /// a row is low when `available < reorder_min`, and the suggestion is
    /// `max(reorder_target - available, 0)`.
    pub async fn warehouse_overview(&self) -> Result<Vec<OverviewRow>, ServiceError> {
        let db = self.db_pool.as_ref();
        let rows = WarehouseStock::find()
            .find_also_related(Product)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(rows
            .into_iter()
            .map(|(stock, product)| {
                let available = stock.available();
                OverviewRow {
                    warehouse_id: stock.warehouse_id,
                    product_id: stock.product_id,
                    product_name: product.map(|p| p.name).unwrap_or_default(),
                    quantity: stock.quantity,
                    reserved_quantity: stock.reserved_quantity,
                    available,
                    reorder_min: stock.reorder_min,
                    reorder_target: stock.reorder_target,
                    low_stock: available < stock.reorder_min,
                    order_suggestion: (stock.reorder_target - available).max(0),
                }
            })
            .collect())
    }

    /// Movement history for a (warehouse, product) pair, newest first.
    pub async fn movements(
        &self,
        warehouse_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        use sea_orm::QueryOrder;
        stock_movement::Entity::find()
            .filter(stock_movement::Column::WarehouseId.eq(warehouse_id))
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .order_by_desc(stock_movement::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

pub(crate) fn unwrap_txn_err(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db) => map_lock_err(db),
        TransactionError::Transaction(service) => service,
    }
}

/// The shared locked read-modify-write primitive. Runs inside the caller's
/// transaction so multi-item workflows (pick task creation/completion) stay
/// all-or-nothing across items.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn apply_movement<C: ConnectionTrait>(
    txn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
    movement: MovementType,
    qty: i32,
    reason: Option<String>,
    reference: Option<(&str, Uuid)>,
    actor_id: Uuid,
) -> Result<warehouse_stock::Model, ServiceError> {
    if qty <= 0 {
        return Err(ServiceError::ValidationError(format!(
            "movement quantity must be positive, got {qty}"
        )));
    }

    let row = lock_row(txn, warehouse_id, product_id).await?;

    let (new_quantity, new_reserved) = match movement {
        MovementType::Receive => (row.quantity + qty, row.reserved_quantity),
        MovementType::Writeoff => {
            if row.available() < qty {
                return Err(ServiceError::InsufficientStock(format!(
                    "product {product_id}: need {qty}, available {}",
                    row.available()
                )));
            }
            (row.quantity - qty, row.reserved_quantity)
        }
        MovementType::Reserve => {
            if row.available() < qty {
                return Err(ServiceError::InsufficientStock(format!(
                    "product {product_id}: need {qty}, available {}",
                    row.available()
                )));
            }
            (row.quantity, row.reserved_quantity + qty)
        }
        MovementType::Release => {
            if row.reserved_quantity < qty {
                error!(
                    warehouse_id = %warehouse_id,
                    product_id = %product_id,
                    reserved = row.reserved_quantity,
                    qty,
                    "release exceeds recorded reservation"
                );
                return Err(ServiceError::InconsistentReservation(format!(
                    "product {product_id}: reserved {} < release {qty}",
                    row.reserved_quantity
                )));
            }
            (row.quantity, row.reserved_quantity - qty)
        }
        MovementType::Pick => {
            if row.quantity < qty || row.reserved_quantity < qty {
                error!(
                    warehouse_id = %warehouse_id,
                    product_id = %product_id,
                    quantity = row.quantity,
                    reserved = row.reserved_quantity,
                    qty,
                    "pick exceeds recorded stock or reservation"
                );
                return Err(ServiceError::InconsistentReservation(format!(
                    "product {product_id}: quantity {} / reserved {} < pick {qty}",
                    row.quantity, row.reserved_quantity
                )));
            }
            (row.quantity - qty, row.reserved_quantity - qty)
        }
    };

    let mut active: warehouse_stock::ActiveModel = row.into();
    active.quantity = Set(new_quantity);
    active.reserved_quantity = Set(new_reserved);
    active.updated_at = Set(Some(Utc::now()));
    let updated = active.update(txn).await.map_err(map_lock_err)?;

    let log_entry = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(warehouse_id),
        product_id: Set(product_id),
        movement_type: Set(movement.to_string()),
        quantity: Set(qty),
        reason: Set(reason),
        reference_type: Set(reference.map(|(t, _)| t.to_string())),
        reference_id: Set(reference.map(|(_, id)| id)),
        actor_id: Set(actor_id),
        created_at: Set(Utc::now()),
    };
    log_entry.insert(txn).await.map_err(ServiceError::DatabaseError)?;

    recompute_availability(txn, product_id).await?;

    Ok(updated)
}

/// Row-locks the (warehouse, product) counters, creating the zeroed row on
/// first reference.
async fn lock_row<C: ConnectionTrait>(
    txn: &C,
    warehouse_id: Uuid,
    product_id: Uuid,
) -> Result<warehouse_stock::Model, ServiceError> {
    let backend = txn.get_database_backend();
    let existing = lock_for_update(
        WarehouseStock::find()
            .filter(warehouse_stock::Column::WarehouseId.eq(warehouse_id))
            .filter(warehouse_stock::Column::ProductId.eq(product_id)),
        backend,
    )
    .one(txn)
    .await
    .map_err(map_lock_err)?;

    if let Some(row) = existing {
        return Ok(row);
    }

    // First reference to this (warehouse, product) pair. The insert happens
    // inside the caller's transaction, so the fresh row is ours until commit.
    let fresh = warehouse_stock::ActiveModel {
        id: Set(Uuid::new_v4()),
        warehouse_id: Set(warehouse_id),
        product_id: Set(product_id),
        quantity: Set(0),
        reserved_quantity: Set(0),
        reorder_min: Set(0),
        reorder_target: Set(0),
        updated_at: Set(Some(Utc::now())),
    };
    fresh.insert(txn).await.map_err(ServiceError::DatabaseError)
}

/// Recomputes the product aggregate shown to shoppers:
/// `stock_quantity = max(sum(quantity) - sum(reserved), 0)`. Hitting zero
/// forces `in_stock = false`; it never flips back on by itself, an operator
/// has to re-enable the product.
pub(crate) async fn recompute_availability<C: ConnectionTrait>(
    txn: &C,
    product_id: Uuid,
) -> Result<(), ServiceError> {
    let rows = WarehouseStock::find()
        .filter(warehouse_stock::Column::ProductId.eq(product_id))
        .all(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let total_quantity: i64 = rows.iter().map(|r| r.quantity as i64).sum();
    let total_reserved: i64 = rows.iter().map(|r| r.reserved_quantity as i64).sum();
    let aggregate = (total_quantity - total_reserved).max(0) as i32;

    let product = Product::find_by_id(product_id)
        .one(txn)
        .await
        .map_err(ServiceError::DatabaseError)?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

    let force_out_of_stock = aggregate <= 0 && product.in_stock;
    let mut active: product::ActiveModel = product.into();
    active.stock_quantity = Set(aggregate);
    if force_out_of_stock {
        active.in_stock = Set(false);
    }
    active.updated_at = Set(Some(Utc::now()));
    active.update(txn).await.map_err(ServiceError::DatabaseError)?;

    Ok(())
}
