pub mod couriers;
pub mod dispatch;
pub mod orders;
pub mod pick_tasks;
pub mod stock_ledger;
