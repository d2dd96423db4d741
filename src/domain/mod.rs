//! Domain layer - Pure business logic.

pub mod chunks;
pub mod dash;
pub mod task;
