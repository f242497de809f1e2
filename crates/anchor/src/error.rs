//! Errors surfaced by the anchor engine.

use chronicle_types::ErrorCode;
use thiserror::Error;

/// Failures during the anchor, confirm, or tx pre-processing paths.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// The lock could not be acquired.
    #[error("lock error: {0}")]
    Lock(#[from] chronicle_lock::LockError),
    /// The block store rejected an append, or a lookup failed.
    #[error("store error: {0}")]
    Store(#[from] chronicle_types::CoreError),
    /// The bus could not accept a required publish.
    #[error("bus error: {0}")]
    Bus(#[from] chronicle_bus::BusError),
    /// The merkle builder rejected the anchor batch.
    #[error("merkle error: {0}")]
    Merkle(#[from] chronicle_merkle::MerkleError),
    /// Signing the anchor/confirm block failed.
    #[error("signing error: {0}")]
    Signing(String),
    /// A raw Bitcoin tx body did not contain the expected aggregation root.
    #[error("aggregation root not found in tx body")]
    RootNotFoundInTxBody,
}

impl ErrorCode for AnchorError {
    fn code(&self) -> &'static str {
        match self {
            Self::Lock(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Bus(e) => e.code(),
            Self::Merkle(_) => "MERKLE_BUILD_FAILED",
            Self::Signing(_) => "CORE_CRYPTO_ERROR",
            Self::RootNotFoundInTxBody => "ANCHOR_ROOT_NOT_FOUND",
        }
    }
}
