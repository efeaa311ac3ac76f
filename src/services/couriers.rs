use crate::{
    db::DbPool,
    entities::courier::{self, Entity as Courier},
    errors::ServiceError,
    events::{Event, EventSender},
    models::status::CourierStatus,
    services::dispatch::DispatchService,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Courier availability management. Verification review itself belongs to
/// the staff CRUD surface outside this core; here couriers only flip their
/// own availability.
#[derive(Clone)]
pub struct CourierService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    dispatch: Arc<DispatchService>,
}

impl CourierService {
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

    pub async fn profile(&self, user_id: Uuid) -> Result<courier::Model, ServiceError> {
        Courier::find()
            .filter(courier::Column::UserId.eq(user_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("No courier profile for user {user_id}")))
    }

    /// Sets the courier's availability. Going `available` immediately gives
    /// the oldest pending order a chance at assignment (best-effort).
    #[instrument(skip(self), fields(user_id = %user_id, status = %status))]
    pub async fn connect(
        &self,
        user_id: Uuid,
        status: CourierStatus,
    ) -> Result<courier::Model, ServiceError> {
        let courier = self.profile(user_id).await?;
        let courier_id = courier.id;

        let mut active: courier::ActiveModel = courier.into();
        active.status = Set(status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(courier_id = %courier_id, "courier availability updated");
        self.event_sender.send_best_effort(Event::CourierConnected {
            courier_id,
            status: status.to_string(),
        });

        if status == CourierStatus::Available {
            if let Err(err) = self.dispatch.try_assign_oldest_pending().await {
                warn!(courier_id = %courier_id, error = %err, "dispatch backfill on connect failed");
            }
        }

        Ok(updated)
    }
}
