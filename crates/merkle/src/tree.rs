//! Binary Merkle tree construction and per-leaf inclusion proof emission.
//!
//! Leaves are taken in the caller's order and never sorted or deduplicated:
//! the tree exists to bind a batch of blocks to one root, not to support
//! membership queries over a set. At each level, nodes are paired
//! left-to-right; an unpaired trailing node is promoted to the next level
//! unchanged rather than hashed with itself.

use crate::error::MerkleError;
use chronicle_crypto::{sha256, sha256d};
use chronicle_types::{HashOp, ProofOp, ProofSegment};

/// A Merkle tree built once over a fixed, ordered set of leaf hashes.
///
/// `levels[0]` holds the leaves; `levels.last()` holds the single root.
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
    hash_op: HashOp,
}

impl MerkleTree {
    /// Builds a tree over `leaves`, hashing each level's pairs with `hash_op`.
    pub fn build(leaves: Vec<[u8; 32]>, hash_op: HashOp) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyLeafSet);
        }
        let mut levels = vec![leaves];
        while levels.last().unwrap().len() > 1 {
            let current = levels.last().unwrap();
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut pairs = current.chunks_exact(2);
            for pair in &mut pairs {
                next.push(apply_hash_op(hash_op, &pair[0], &pair[1]));
            }
            if let [leftover] = pairs.remainder() {
                next.push(*leftover);
            }
            levels.push(next);
        }
        Ok(Self { levels, hash_op })
    }

    /// The root hash of the tree.
    pub fn root(&self) -> [u8; 32] {
        *self.levels.last().unwrap().first().unwrap()
    }

    /// The root hash, hex-encoded.
    pub fn root_hex(&self) -> String {
        hex::encode(self.root())
    }

    /// Number of leaves the tree was built from.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Builds the inclusion proof segment for the leaf at `index`, binding
    /// that leaf's hash to this tree's root.
    ///
    /// At each level, a node paired with a sibling emits a `{l}`/`{r}` op
    /// carrying the sibling's hex bytes followed by an `{op}` hash step; a
    /// node promoted unchanged (the odd one out) emits nothing and simply
    /// carries forward to the next level at the same index.
    pub fn proof(&self, index: usize) -> Result<ProofSegment, MerkleError> {
        if index >= self.leaf_count() {
            return Err(MerkleError::LeafIndexOutOfRange {
                    index,
                    len: self.leaf_count(),
            });
        }
        let mut ops = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let is_left = idx % 2 == 0;
            let sibling_idx = if is_left { idx + 1 } else { idx - 1 };
            if let Some(sibling) = level.get(sibling_idx) {
                let sibling_hex = hex::encode(sibling);
                if is_left {
                    ops.push(ProofOp::Right { r: sibling_hex });
                } else {
                    ops.push(ProofOp::Left { l: sibling_hex });
                }
                ops.push(ProofOp::Op { op: self.hash_op });
            }
            idx /= 2;
        }
        Ok(ops)
    }
}

/// Applies a proof segment to `leaf`, returning the resulting root hash.
/// Used by verifiers that only hold a proof, not the full tree.
pub fn apply_proof(leaf: &[u8; 32], ops: &ProofSegment) -> [u8; 32] {
    let mut acc = *leaf;
    // A run of `l`/`r` ops can queue more than one fragment on either side
    // before an `op` step — e.g. the Bitcoin tx pre-processing path wraps
    // the accumulator in both a prefix and a suffix in one hash step —
    // so fragments accumulate in push order until the next `op` flushes them.
    let mut pending_left: Vec<Vec<u8>> = Vec::new();
    let mut pending_right: Vec<Vec<u8>> = Vec::new();
    for op in ops {
        match op {
            ProofOp::Left { l } => {
                if let Ok(bytes) = hex::decode(l) {
                    pending_left.push(bytes);
                }
            }
            ProofOp::Right { r } => {
                if let Ok(bytes) = hex::decode(r) {
                    pending_right.push(bytes);
                }
            }
            ProofOp::Op { op } => {
                let mut data = Vec::with_capacity(64);
                for l in pending_left.drain(..) {
                    data.extend_from_slice(&l);
                }
                data.extend_from_slice(&acc);
                for r in pending_right.drain(..) {
                    data.extend_from_slice(&r);
                }
                acc = match op {
                    HashOp::Sha256 => sha256(&data),
                    HashOp::Sha256x2 => sha256d(&data),
                };
            }
        }
    }
    acc
}

fn apply_hash_op(op: HashOp, left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(left);
    data.extend_from_slice(right);
    match op {
        HashOp::Sha256 => sha256(&data),
        HashOp::Sha256x2 => sha256d(&data),
    }
}
