pub mod cart_item;
pub mod courier;
pub mod order;
pub mod order_event;
pub mod order_item;
pub mod pick_task;
pub mod pick_task_item;
pub mod product;
pub mod stock_movement;
pub mod warehouse;
pub mod warehouse_stock;
