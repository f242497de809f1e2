//! The Lock Service and Leader Elector: TTL-leased
//! distributed locking backed by a Redis-compatible coordination store.

pub mod backoff;
pub mod elector;
pub mod error;
pub mod lease;

pub use elector::LeaderElector;
pub use error::LockError;
pub use lease::{Lease, LockClient, LockEvent, DEFAULT_TTL};
