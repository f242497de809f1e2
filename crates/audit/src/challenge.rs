//! Audit challenge generation and the short-TTL cache peers read from.

use crate::error::AuditError;
use chronicle_storage::BlockStore;
use chronicle_types::{AuditChallenge, HashOp};
use rand::{Rng, RngCore};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Generates a fresh challenge over a window ending 1000 blocks behind the
/// current tip (so the challenged range is stable even as new blocks land),
/// spanning a random 10-999 block width.
pub fn generate(store: &BlockStore) -> Result<AuditChallenge, AuditError> {
    let tip = store.tip()?.ok_or(AuditError::EmptyCalendar)?;
    let max = if tip.id > 2000 { tip.id - 1000 } else { tip.id };
    let span = rand::thread_rng().gen_range(10..1000);
    let min = max.saturating_sub(span);

    let blocks = store.scan(min..max + 1, &[])?;
    let nonce = random_nonce();
    let mut leaves = Vec::with_capacity(blocks.len() + 1);
    leaves.push(nonce);
    for block in &blocks {
        leaves.push(decode_hash(&block.hash));
    }
    let tree = chronicle_merkle::MerkleTree::build(leaves, HashOp::Sha256)?;

    Ok(AuditChallenge {
            time: now_ms(),
            min_block_height: min,
            max_block_height: max,
            nonce: hex::encode(nonce),
            solution: tree.root_hex(),
    })
}

fn random_nonce() -> [u8; 32] {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

fn decode_hash(hash_hex: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    if let Ok(bytes) = hex::decode(hash_hex) {
        let len = bytes.len().min(32);
        out[..len].copy_from_slice(&bytes[..len]);
    }
    out
}

fn now_ms() -> i64 {
    SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as i64
}

/// Holds the single current challenge, readable by any number of
/// concurrent task workers without ever observing a half-written value.
pub struct ChallengeCache {
    current: RwLock<Option<AuditChallenge>>,
}

impl ChallengeCache {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Atomically replaces the cached challenge.
    pub fn set(&self, challenge: AuditChallenge) {
        *self.current.write().expect("challenge cache lock poisoned") = Some(challenge);
    }

    /// The current challenge, if one has been generated yet.
    pub fn get(&self) -> Option<AuditChallenge> {
        self.current
        .read()
        .expect("challenge cache lock poisoned")
        .clone()
    }
}

impl Default for ChallengeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_crypto::sha256_hex;
    use chronicle_types::{Block, BlockType, BLOCK_VERSION};
    use tempfile::tempdir;

    fn block(id: u64, prev_hash: &str) -> Block {
        let mut b = Block {
            id,
            time: 1_700_000_000 + id as i64,
            version: BLOCK_VERSION,
            stack_id: "s1".into(),
            block_type: BlockType::Cal,
            data_id: id.to_string(),
            data_val: format!("val-{id}"),
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
            sig: "fp:sig".into(),
        };
        b.hash = sha256_hex(&b.hash_preimage());
        b
    }

    #[test]
    fn generate_rejects_an_empty_calendar() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        assert!(matches!(generate(&store), Err(AuditError::EmptyCalendar)));
    }

    #[test]
    fn generate_produces_a_well_formed_challenge() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        let genesis = block(0, &chronicle_types::block::zero_hash());
        store.append(&genesis).unwrap();
        let next = block(1, &genesis.hash);
        store.append(&next).unwrap();

        let challenge = generate(&store).unwrap();
        assert_eq!(challenge.nonce.len(), 64);
        assert_eq!(challenge.solution.len(), 64);
        assert!(challenge.min_block_height <= challenge.max_block_height);
        assert_eq!(challenge.max_block_height, 1);
    }

    #[test]
    fn cache_starts_empty_and_reflects_the_latest_set() {
        let cache = ChallengeCache::new();
        assert!(cache.get().is_none());
        let c = AuditChallenge {
            time: 1,
            min_block_height: 0,
            max_block_height: 1,
            nonce: "aa".repeat(32),
            solution: "bb".repeat(32),
        };
        cache.set(c.clone());
        assert_eq!(cache.get(), Some(c));
    }
}
