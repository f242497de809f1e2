//! The Signer: a long-lived Ed25519 keypair that produces and
//! verifies detached, base64-encoded signatures over block hashes, and
//! exposes a short fingerprint of its public key for multi-org coexistence.

use crate::error::CryptoError;
use crate::hash::sha256_hex;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dcrypt::sign::eddsa::{self, Ed25519PublicKey, Ed25519SecretKey};
use rand::rngs::OsRng;

/// Number of hex characters of `sha256(pubkey)` used as the fingerprint.
const FINGERPRINT_LEN: usize = 12;

/// Holds a single Ed25519 keypair for the lifetime of one process.
///
/// Rotation is intentionally not supported within a single run:
/// operators restart with a new key file to rotate, and the resulting
/// fingerprint change is how downstream consumers tell keys apart.
pub struct Signer {
    public_key: Ed25519PublicKey,
    secret_key: Ed25519SecretKey,
    fingerprint: String,
}

impl Signer {
    /// Generates a fresh keypair. Used by tests and first-run bootstrap.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut rng = OsRng;
        let (public_key, secret_key) = eddsa::Ed25519::keypair(&mut rng)?;
        Ok(Self::from_keys(public_key, secret_key))
    }

    /// Loads a keypair from a 32-byte Ed25519 seed, as read from the
    /// base64 secret key supplied at start.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret_key = Ed25519SecretKey::from_seed(seed)
        .map_err(|e| CryptoError::InvalidKey(format!("{:?}", e)))?;
        let public_key = secret_key
        .public_key()
        .map_err(|e| CryptoError::InvalidKey(format!("{:?}", e)))?;
        Ok(Self::from_keys(public_key, secret_key))
    }

    /// Loads a keypair from a base64-encoded 32-byte seed.
    pub fn from_base64_seed(encoded: &str) -> Result<Self, CryptoError> {
        let raw = STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::Decode(e.to_string()))?;
        if raw.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                        "expected 32-byte seed, got {} bytes",
                        raw.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&raw);
        Self::from_seed(&seed)
    }

    fn from_keys(public_key: Ed25519PublicKey, secret_key: Ed25519SecretKey) -> Self {
        let fingerprint = sha256_hex(&public_key.to_bytes())[..FINGERPRINT_LEN].to_string();
        Self {
            public_key,
            secret_key,
            fingerprint,
        }
    }

    /// First 12 hex chars of `SHA-256(publicKeyBytes)`.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Signs the ASCII bytes of a hex hash string, returning
    /// `fingerprint12:base64Signature` as required for `Block::sig`.
    pub fn sign(&self, hash_hex: &str) -> Result<String, CryptoError> {
        let signature = eddsa::Ed25519::sign(hash_hex.as_bytes(), &self.secret_key)?;
        Ok(format!(
                "{}:{}",
                self.fingerprint,
                STANDARD.encode(signature.to_bytes())
        ))
    }

    /// Verifies a `fingerprint12:base64Signature` string against this
    /// Signer's own public key and a candidate hash-hex string.
    pub fn verify(&self, hash_hex: &str, sig: &str) -> Result<(), CryptoError> {
        let (fp, b64) = sig
        .split_once(':')
        .ok_or_else(|| CryptoError::InvalidSignature("missing ':' separator".into()))?;
        if fp != self.fingerprint {
            return Err(CryptoError::InvalidSignature(format!(
                        "fingerprint mismatch: expected {}, got {}",
                        self.fingerprint, fp
            )));
        }
        let raw = STANDARD
        .decode(b64)
        .map_err(|e| CryptoError::Decode(e.to_string()))?;
        let signature = eddsa::Ed25519Signature::from_bytes(&raw)
        .map_err(|e| CryptoError::InvalidSignature(format!("{:?}", e)))?;
        eddsa::Ed25519::verify(hash_hex.as_bytes(), &signature, &self.public_key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = Signer::generate().unwrap();
        let sig = signer.sign("deadbeef").unwrap();
        assert!(sig.starts_with(&format!("{}:", signer.fingerprint())));
        signer.verify("deadbeef", &sig).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_hash() {
        let signer = Signer::generate().unwrap();
        let sig = signer.sign("deadbeef").unwrap();
        assert!(signer.verify("not-deadbeef", &sig).is_err());
    }

    #[test]
    fn fingerprint_is_twelve_hex_chars() {
        let signer = Signer::generate().unwrap();
        assert_eq!(signer.fingerprint().len(), FINGERPRINT_LEN);
        assert!(signer.fingerprint().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn from_seed_is_deterministic() {
        let seed = [7u8; 32];
        let a = Signer::from_seed(&seed).unwrap();
        let b = Signer::from_seed(&seed).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        let sig = a.sign("cafebabe").unwrap();
        b.verify("cafebabe", &sig).unwrap();
    }
}
