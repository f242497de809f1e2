//! Audit challenge model.

use serde::{Deserialize, Serialize};

/// A time-bound Merkle challenge that Nodes must solve to prove they hold
/// an up-to-date copy of the Calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditChallenge {
    /// Epoch-ms timestamp the challenge was generated.
    pub time: i64,
    /// Lower bound (inclusive) of the block range the challenge covers.
    pub min_block_height: u64,
    /// Upper bound (inclusive) of the block range the challenge covers.
    pub max_block_height: u64,
    /// 32-byte hex random nonce.
    pub nonce: String,
    /// 32-byte hex Merkle root of `[nonce, hash(block[min]),..., hash(block[max])]`.
    pub solution: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_round_trips_through_json() {
        let c = AuditChallenge {
            time: 1000,
            min_block_height: 1,
            max_block_height: 5,
            nonce: "aa".repeat(32),
            solution: "bb".repeat(32),
        };
        let s = serde_json::to_string(&c).unwrap();
        let back: AuditChallenge = serde_json::from_str(&s).unwrap();
        assert_eq!(c, back);
    }
}
