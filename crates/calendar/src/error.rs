//! Errors surfaced by the Calendar writer.

use chronicle_types::ErrorCode;
use thiserror::Error;

/// Failures that can abort a single Calendar tick.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// The coordination backend (lock) is unavailable.
    #[error("lock error: {0}")]
    Lock(#[from] chronicle_lock::LockError),
    /// The block store rejected the append after exhausting retries.
    #[error("store error: {0}")]
    Store(#[from] chronicle_types::CoreError),
    /// The bus adapter could not publish the tick's proof messages.
    #[error("bus error: {0}")]
    Bus(#[from] chronicle_bus::BusError),
    /// The merkle builder rejected the tick's aggregator batch.
    #[error("merkle error: {0}")]
    Merkle(#[from] chronicle_merkle::MerkleError),
    /// Signing the cal block failed.
    #[error("signing error: {0}")]
    Signing(String),
}

impl ErrorCode for CalendarError {
    fn code(&self) -> &'static str {
        match self {
            Self::Lock(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Bus(e) => e.code(),
            Self::Merkle(_) => "MERKLE_BUILD_FAILED",
            Self::Signing(_) => "CORE_CRYPTO_ERROR",
        }
    }
}
