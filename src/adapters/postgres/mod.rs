//! PostgreSQL adapter.
//!
//! Implements `IdempotencyStore` on `processed_videos` and `ErrorSink` on
//! `process_errors_log`. The tables are created outside this crate.

mod ledger;
mod pool;

pub use pool::PgLedger;

const SUCCESS_STATUS: &str = "success";
