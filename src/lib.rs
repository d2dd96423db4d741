//! Dashcast - chunked upload to MPEG-DASH conversion worker
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (tasks, chunk merging, DASH packaging)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations
//! - application/: Generic services (dispatcher, worker pool, retry)
//! - config: Environment configuration
//!
//! # Features
//! - `amqp`: RabbitMQ consumer and publisher (lapin)
//! - `postgres`: PostgreSQL idempotency ledger and error log (sqlx)

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod telemetry;

// Re-exports for convenience
pub use config::WorkerConfig;
pub use error::{PipelineError, Stage};
