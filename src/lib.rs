pub mod alerts;
pub mod core;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod ops;
pub mod reports;
pub mod stores;
pub mod utils;
pub mod wal;
