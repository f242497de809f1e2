//! Re-exports and glue for the storage crate's error type.
//!
//! The invariants this crate enforces (contiguous ids, matching `prevHash`)
//! are named in [`chronicle_types::CoreError`]; this crate only adds the
//! mapping from `redb`'s own error types onto `CoreError::Backend`.

pub use chronicle_types::CoreError;

pub(crate) fn backend(e: impl std::fmt::Display) -> CoreError {
    CoreError::Backend(e.to_string())
}
