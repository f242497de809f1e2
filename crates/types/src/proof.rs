//! Proof segment format: the wire representation of a Merkle
//! inclusion proof plus the extension ops used to bind a calendar/anchor
//! root back to a block hash.

use serde::{Deserialize, Serialize};

/// The hashing operator applied to the accumulator after a run of `l`/`r` ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashOp {
    /// Single SHA-256.
    #[serde(rename = "sha-256")]
    Sha256,
    /// SHA-256 applied twice (used by the Bitcoin confirmation path).
    #[serde(rename = "sha-256-x2")]
    Sha256x2,
}

/// A single step of a proof segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProofOp {
    /// Concatenate `l` to the left of the current accumulator.
    Left {
        /// Hex bytes to concatenate on the left.
        l: String,
    },
    /// Concatenate `r` to the right of the current accumulator.
    Right {
        /// Hex bytes to concatenate on the right.
        r: String,
    },
    /// Apply a hash operator to the current accumulator.
    Op {
        /// Which hash function to apply.
        op: HashOp,
    },
}

/// An ordered sequence of proof operations binding one input hash to a
/// downstream root.
pub type ProofSegment = Vec<ProofOp>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_op_round_trips_through_json() {
        let ops: ProofSegment = vec![
            ProofOp::Left { l: "aa".into() },
            ProofOp::Right { r: "bb".into() },
            ProofOp::Op { op: HashOp::Sha256 },
        ];
        let s = serde_json::to_string(&ops).unwrap();
        let back: ProofSegment = serde_json::from_str(&s).unwrap();
        assert_eq!(ops, back);
        assert!(s.contains("\"l\":\"aa\""));
        assert!(s.contains("\"sha-256\""));
    }
}
