//! Errors surfaced by the Node Registry, re-exported from the shared
//! taxonomy so this crate's HTTP layer can map them directly to
//! stable HTTP status codes.

pub use chronicle_types::{ErrorCode, RegistryError};

pub(crate) fn backend(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Internal(e.to_string())
}
