//! The Message Bus Adapter: durable AMQP queues binding the
//! Calendar writer, anchor engine, audit engine, and reward engine.

pub mod adapter;
pub mod error;
pub mod queues;

pub use adapter::{ack, discard_in_flight, nack, BusAdapter, RECONNECT_BACKOFF};
pub use error::BusError;
