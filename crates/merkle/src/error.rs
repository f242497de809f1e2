//! Errors surfaced by the Merkle builder.

use chronicle_types::ErrorCode;
use thiserror::Error;

/// Failures constructing a tree or locating a proof within one.
#[derive(Debug, Error)]
pub enum MerkleError {
    /// `build` was called with zero leaves.
    #[error("cannot build a merkle tree with zero leaves")]
    EmptyLeafSet,
    /// A proof was requested for a leaf index outside the tree.
    #[error("leaf index {index} out of range for a tree of {len} leaves")]
    LeafIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of leaves actually in the tree.
        len: usize,
    },
}

impl ErrorCode for MerkleError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyLeafSet => "MERKLE_EMPTY_LEAF_SET",
            Self::LeafIndexOutOfRange {.. } => "MERKLE_LEAF_INDEX_OUT_OF_RANGE",
        }
    }
}
