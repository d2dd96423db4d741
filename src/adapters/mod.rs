//! Adapters - Concrete implementations of ports.

#[cfg(feature = "amqp")]
pub mod amqp;

#[cfg(feature = "postgres")]
pub mod postgres;

pub mod ffmpeg;
pub mod memory;
