pub mod couriers;
pub mod orders;
pub mod warehouse;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;
use std::time::Duration;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<crate::services::orders::OrderService>,
    pub dispatch: Arc<crate::services::dispatch::DispatchService>,
    pub pick_tasks: Arc<crate::services::pick_tasks::PickTaskService>,
    pub stock_ledger: Arc<crate::services::stock_ledger::StockLedgerService>,
    pub couriers: Arc<crate::services::couriers::CourierService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        statement_timeout: Duration,
    ) -> Self {
        let dispatch = Arc::new(crate::services::dispatch::DispatchService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            dispatch.clone(),
        ));
        let pick_tasks = Arc::new(crate::services::pick_tasks::PickTaskService::new(
            db_pool.clone(),
            event_sender.clone(),
            statement_timeout,
        ));
        let stock_ledger = Arc::new(crate::services::stock_ledger::StockLedgerService::new(
            db_pool.clone(),
            event_sender.clone(),
            statement_timeout,
        ));
        let couriers = Arc::new(crate::services::couriers::CourierService::new(
            db_pool,
            event_sender,
            dispatch.clone(),
        ));

        Self {
            orders,
            dispatch,
            pick_tasks,
            stock_ledger,
            couriers,
        }
    }
}
