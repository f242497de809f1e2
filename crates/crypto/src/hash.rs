//! Hashing helpers shared by the block store, merkle builder, and the
//! Bitcoin confirmation path (which needs the doubled `sha-256-x2` form).

use sha2::{Digest, Sha256};

/// Single SHA-256 over arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 applied twice, as used by `{op:"sha-256-x2"}` proof steps.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// `sha256` with the result hex-encoded, the representation blocks and
/// proofs actually carry on the wire.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// `sha256d` with the result hex-encoded.
pub fn sha256d_hex(data: &[u8]) -> String {
    hex::encode(sha256d(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_matches_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256d_is_sha256_twice() {
        let once = sha256(b"abc");
        let twice = sha256(&once);
        assert_eq!(sha256d(b"abc"), twice);
    }
}
