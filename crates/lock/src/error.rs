//! Errors surfaced by the lock service and leader elector.

pub use chronicle_types::CoordinationError as LockError;
