//! Ports - narrow capability traits the pipeline depends on.
//!
//! Adapters in `crate::adapters` implement these against PostgreSQL,
//! RabbitMQ and ffmpeg; `adapters::memory` provides in-process fakes.

pub mod delivery;
pub mod encoder;
pub mod errors;
pub mod idempotency;
pub mod publisher;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
