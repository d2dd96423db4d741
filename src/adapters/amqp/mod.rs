//! RabbitMQ adapter.
//!
//! - `AmqpClient`: connection, topology declaration, consumer stream
//! - `AmqpDelivery`: `InboundMessage` over a lapin delivery
//! - `AmqpPublisher`: `MessagePublisher` for confirmation events

mod client;
mod delivery;
mod publisher;

pub use client::{AmqpClient, Topology};
pub use delivery::AmqpDelivery;
pub use publisher::AmqpPublisher;
