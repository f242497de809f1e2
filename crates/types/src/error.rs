//! Shared error taxonomy for the Chronicle calendar engine.
//!
//! Every crate in the workspace defines its own `thiserror` enum for the
//! failures it can produce, but all of them report a stable `code()` string
//! from a small, closed vocabulary so HTTP and log consumers can key off it.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors surfaced by the block store, merkle builder, and signer — the
/// primitives that every higher-level engine composes on top of.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The block's `id` is not the next dense id after the current tip.
    #[error("non-contiguous block id: expected {expected}, got {got}")]
    NonContiguousId {
        /// The id the store expected next.
        expected: u64,
        /// The id actually supplied.
        got: u64,
    },
    /// The block's `prevHash` does not match the store's current tip hash.
    #[error("mismatched prevHash: expected {expected}, got {got}")]
    MismatchedPrevHash {
        /// The tip hash the store expected to be referenced.
        expected: String,
        /// The `prevHash` actually supplied.
        got: String,
    },
    /// A block with this id already exists in the store.
    #[error("block {0} already exists")]
    DuplicateId(u64),
    /// The requested block id has no corresponding row.
    #[error("block {0} not found")]
    NotFound(u64),
    /// A signature failed to verify against the advertised fingerprint.
    #[error("signature verification failed for fingerprint {0}")]
    InvalidSignature(String),
    /// A hex field could not be decoded.
    #[error("invalid hex in field {field}: {source}")]
    InvalidHex {
        /// The name of the field that failed to decode.
        field: &'static str,
        /// The underlying decode error.
        #[source]
        source: hex::FromHexError,
    },
    /// The storage backend returned an error unrelated to the invariants above.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl ErrorCode for CoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::NonContiguousId {.. } => "CORE_NON_CONTIGUOUS_ID",
            Self::MismatchedPrevHash {.. } => "CORE_MISMATCHED_PREV_HASH",
            Self::DuplicateId(_) => "CORE_DUPLICATE_ID",
            Self::NotFound(_) => "CORE_NOT_FOUND",
            Self::InvalidSignature(_) => "CORE_INVALID_SIGNATURE",
            Self::InvalidHex {.. } => "CORE_INVALID_HEX",
            Self::Backend(_) => "CORE_BACKEND_ERROR",
            Self::Crypto(_) => "CORE_CRYPTO_ERROR",
        }
    }
}

/// Errors surfaced by the lock service and leader elector.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// The backend (redis or equivalent) is unreachable.
    #[error("coordination backend unavailable: {0}")]
    Unavailable(String),
    /// The lock was lost (e.g. lease expired) while the caller still believed it held it.
    #[error("lock '{0}' was lost before release")]
    LockLost(String),
}

impl ErrorCode for CoordinationError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "DEPENDENCY_UNAVAILABLE",
            Self::LockLost(_) => "COORDINATION_LOCK_LOST",
        }
    }
}

/// Errors surfaced by the message bus adapter.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus connection is down; reconnection is in progress.
    #[error("bus unavailable: {0}")]
    Unavailable(String),
    /// Publishing a message failed after the channel accepted it for delivery.
    #[error("publish failed: {0}")]
    PublishFailed(String),
    /// A message body could not be decoded into any known variant.
    #[error("undecodable message body: {0}")]
    UndecodableBody(String),
}

impl ErrorCode for BusError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "DEPENDENCY_UNAVAILABLE",
            Self::PublishFailed(_) => "BUS_PUBLISH_FAILED",
            Self::UndecodableBody(_) => "BUS_UNDECODABLE_BODY",
        }
    }
}

/// Errors surfaced by the Node Registry, mapped 1:1 onto stable HTTP
/// error codes.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The request body or header failed basic validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The tnt address or public URI already belongs to another Node.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The registration cap has been reached, or the Node's balance is too low.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The caller's node software version is below the configured minimum.
    #[error("upgrade required: {0}")]
    UpgradeRequired(String),
    /// No Node exists with the given tnt address.
    #[error("not found: {0}")]
    NotFound(String),
    /// An HMAC or other authentication check failed.
    #[error("authentication failed: {0}")]
    AuthFailure(String),
    /// A downstream dependency (balance service, store) failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgumentError",
            Self::Conflict(_) => "ConflictError",
            Self::Forbidden(_) => "ForbiddenError",
            Self::UpgradeRequired(_) => "UpgradeRequiredError",
            Self::NotFound(_) => "NotFoundError",
            Self::AuthFailure(_) => "InvalidArgumentError",
            Self::Internal(_) => "InternalServerError",
        }
    }
}

/// Errors surfaced by the reward engine's token transfer path.
#[derive(Debug, Error)]
pub enum RewardError {
    /// The token transfer service could not be reached or returned an error.
    #[error("token transfer failed: {0}")]
    TransferFailed(String),
    /// The reward block could not be appended to the calendar.
    #[error("reward block append failed: {0}")]
    AppendFailed(#[from] CoreError),
}

impl ErrorCode for RewardError {
    fn code(&self) -> &'static str {
        match self {
            Self::TransferFailed(_) => "DEPENDENCY_UNAVAILABLE",
            Self::AppendFailed(_) => "CORE_BACKEND_ERROR",
        }
    }
}
