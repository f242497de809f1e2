//! Errors surfaced by the message bus adapter.

pub use chronicle_types::BusError;

pub(crate) fn from_lapin(e: lapin::Error) -> BusError {
    BusError::Unavailable(e.to_string())
}
