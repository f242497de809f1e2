//! Crypto-layer errors.

use chronicle_types::ErrorCode;
use thiserror::Error;

/// Errors from signing, verification, and key handling.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key generation or parsing failed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// A signature failed to parse or verify.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    /// A hex or base64 field could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// The underlying `dcrypt` primitive reported a failure.
    #[error("cryptographic operation failed: {0}")]
    OperationFailed(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::InvalidSignature(_) => "CRYPTO_INVALID_SIGNATURE",
            Self::Decode(_) => "CRYPTO_DECODE_ERROR",
            Self::OperationFailed(_) => "CRYPTO_OPERATION_FAILED",
        }
    }
}

impl From<dcrypt::Error> for CryptoError {
    fn from(e: dcrypt::Error) -> Self {
        CryptoError::OperationFailed(e.to_string())
    }
}

impl From<hex::FromHexError> for CryptoError {
    fn from(e: hex::FromHexError) -> Self {
        CryptoError::Decode(e.to_string())
    }
}
