//! Application layer - Generic services that use ports.

pub mod dispatcher;
pub mod idempotency;
pub mod locks;
pub mod recorder;
pub mod retry;
pub mod worker;
