pub mod cache;
pub mod models;
pub mod notifier;
pub mod order_repo;
pub mod payment;
