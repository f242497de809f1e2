//! Merkle tree construction and inclusion proof emission for the Chronicle
//! calendar engine.

pub mod error;
pub mod tree;

pub use error::MerkleError;
pub use tree::{apply_proof, MerkleTree};
