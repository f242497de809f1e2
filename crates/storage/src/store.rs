//! The Block Store: a single-writer, append-only log of
//! [`Block`]s keyed by their dense `id`, backed by `redb`.
//!
//! Unlike a throughput-oriented store that defers persistence to a
//! background thread, every [`BlockStore::append`] commits synchronously:
//! a block must be durable on disk before the caller is told it was
//! accepted, so there is no write-behind buffer here to lose.

use crate::error::{backend, CoreError};
use chronicle_types::{Block, BlockType};
use redb::{Database, ReadableTable, TableDefinition};
use std::ops::Range;
use std::path::Path;

const BLOCKS: TableDefinition<&[u8; 8], &[u8]> = TableDefinition::new("BLOCKS");
/// `stackId\0blockType -> id`, so "last block of this type for this stack"
/// doesn't require a full-table scan.
const TYPE_INDEX: TableDefinition<&[u8], &[u8; 8]> = TableDefinition::new("TYPE_INDEX");

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn type_index_key(stack_id: &str, block_type: BlockType) -> Vec<u8> {
    let mut key = stack_id.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(block_type.as_str().as_bytes());
    key
}

/// A handle to one Calendar stack's append-only block log.
pub struct BlockStore {
    db: Database,
}

impl BlockStore {
    /// Opens (creating if absent) the block log at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        let w = db.begin_write().map_err(backend)?;
        {
            w.open_table(BLOCKS).map_err(backend)?;
            w.open_table(TYPE_INDEX).map_err(backend)?;
        }
        w.commit().map_err(backend)?;
        Ok(Self { db })
    }

    /// Appends `block` to the log, rejecting it if its `id` is not the next
    /// dense id after the current tip, or its `prevHash` does not match the
    /// current tip's hash.
    pub fn append(&self, block: &Block) -> Result<(), CoreError> {
        let current_tip = self.tip()?;
        let (expected_id, expected_prev_hash) = match &current_tip {
            Some(tip) => (tip.id + 1, tip.hash.clone()),
            None => (0, chronicle_types::block::zero_hash()),
        };
        if block.id != expected_id {
            return Err(CoreError::NonContiguousId {
                    expected: expected_id,
                    got: block.id,
            });
        }
        if block.prev_hash != expected_prev_hash {
            return Err(CoreError::MismatchedPrevHash {
                    expected: expected_prev_hash,
                    got: block.prev_hash.clone(),
            });
        }

        let bytes = serde_json::to_vec(block)
        .map_err(|e| CoreError::Backend(format!("serialize block: {e}")))?;
        let w = self.db.begin_write().map_err(backend)?;
        {
            let mut blocks = w.open_table(BLOCKS).map_err(backend)?;
            if blocks
            .get(&id_key(block.id))
            .map_err(backend)?
            .is_some()
            {
                return Err(CoreError::DuplicateId(block.id));
            }
            blocks
            .insert(&id_key(block.id), bytes.as_slice())
            .map_err(backend)?;

            let mut index = w.open_table(TYPE_INDEX).map_err(backend)?;
            index
            .insert(
                type_index_key(&block.stack_id, block.block_type).as_slice(),
                &id_key(block.id),
            )
            .map_err(backend)?;
        }
        w.commit().map_err(backend)?;
        tracing::debug!(id = block.id, hash = %block.hash, "appended block");
        Ok(())
    }

    /// The most recently appended block, or `None` for an empty stack.
    pub fn tip(&self) -> Result<Option<Block>, CoreError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(BLOCKS).map_err(backend)?;
        match table.last().map_err(backend)? {
            Some((_, v)) => Ok(Some(decode(v.value())?)),
            None => Ok(None),
        }
    }

    /// Looks up a single block by its id.
    pub fn by_id(&self, id: u64) -> Result<Option<Block>, CoreError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(BLOCKS).map_err(backend)?;
        match table.get(&id_key(id)).map_err(backend)? {
            Some(v) => Ok(Some(decode(v.value())?)),
            None => Ok(None),
        }
    }

    /// Blocks with `id` in `range`, optionally filtered to `types`. An empty
    /// `types` filter returns every block type.
    pub fn scan(&self, range: Range<u64>, types: &[BlockType]) -> Result<Vec<Block>, CoreError> {
        let r = self.db.begin_read().map_err(backend)?;
        let table = r.open_table(BLOCKS).map_err(backend)?;
        let start = id_key(range.start);
        let end = id_key(range.end);
        let mut out = Vec::new();
        for entry in table.range(start.as_slice()..end.as_slice()).map_err(backend)? {
            let (_, v) = entry.map_err(backend)?;
            let block = decode(v.value())?;
            if types.is_empty() || types.contains(&block.block_type) {
                out.push(block);
            }
        }
        Ok(out)
    }

    /// The most recent block of `block_type` for `stack_id`, if any.
    pub fn last_of_type(
        &self,
        block_type: BlockType,
        stack_id: &str,
    ) -> Result<Option<Block>, CoreError> {
        let r = self.db.begin_read().map_err(backend)?;
        let index = r.open_table(TYPE_INDEX).map_err(backend)?;
        let key = type_index_key(stack_id, block_type);
        let id = match index.get(key.as_slice()).map_err(backend)? {
            Some(v) => u64::from_be_bytes(*v.value()),
            None => return Ok(None),
        };
        drop(index);
        let table = r.open_table(BLOCKS).map_err(backend)?;
        match table.get(&id_key(id)).map_err(backend)? {
            Some(v) => Ok(Some(decode(v.value())?)),
            None => Ok(None),
        }
    }
}

fn decode(bytes: &[u8]) -> Result<Block, CoreError> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::Backend(format!("decode block: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_crypto::sha256_hex;
    use chronicle_types::BLOCK_VERSION;
    use tempfile::tempdir;

    fn block(id: u64, prev_hash: &str, block_type: BlockType) -> Block {
        let stack_id = "s1".to_string();
        let data_id = id.to_string();
        let data_val = format!("val-{id}");
        let mut b = Block {
            id,
            time: 1_700_000_000 + id as i64,
            version: BLOCK_VERSION,
            stack_id,
            block_type,
            data_id,
            data_val,
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
            sig: "fp:sig".to_string(),
        };
        b.hash = sha256_hex(&b.hash_preimage());
        b
    }

    #[test]
    fn genesis_then_contiguous_append_round_trips() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        assert!(store.tip().unwrap().is_none());

        let genesis = block(0, &chronicle_types::block::zero_hash(), BlockType::Gen);
        store.append(&genesis).unwrap();
        let next = block(1, &genesis.hash, BlockType::Cal);
        store.append(&next).unwrap();

        let tip = store.tip().unwrap().unwrap();
        assert_eq!(tip.id, 1);
        assert_eq!(store.by_id(0).unwrap().unwrap().id, 0);
    }

    #[test]
    fn append_rejects_non_contiguous_id() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        let genesis = block(0, &chronicle_types::block::zero_hash(), BlockType::Gen);
        store.append(&genesis).unwrap();
        let bad = block(5, &genesis.hash, BlockType::Cal);
        assert!(matches!(
                store.append(&bad),
                Err(CoreError::NonContiguousId { expected: 1, got: 5 })
        ));
    }

    #[test]
    fn append_rejects_mismatched_prev_hash() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        let genesis = block(0, &chronicle_types::block::zero_hash(), BlockType::Gen);
        store.append(&genesis).unwrap();
        let bad = block(1, "deadbeef", BlockType::Cal);
        assert!(matches!(
                store.append(&bad),
                Err(CoreError::MismatchedPrevHash {.. })
        ));
    }

    #[test]
    fn scan_filters_by_type_and_range() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        let genesis = block(0, &chronicle_types::block::zero_hash(), BlockType::Gen);
        store.append(&genesis).unwrap();
        let cal1 = block(1, &genesis.hash, BlockType::Cal);
        store.append(&cal1).unwrap();
        let cal2 = block(2, &cal1.hash, BlockType::Cal);
        store.append(&cal2).unwrap();

        let all = store.scan(0..3, &[]).unwrap();
        assert_eq!(all.len(), 3);

        let cal_only = store.scan(0..3, &[BlockType::Cal]).unwrap();
        assert_eq!(cal_only.len(), 2);
        assert!(cal_only.iter().all(|b| b.block_type == BlockType::Cal));
    }

    #[test]
    fn last_of_type_tracks_the_most_recent_match() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("blocks.redb")).unwrap();
        let genesis = block(0, &chronicle_types::block::zero_hash(), BlockType::Gen);
        store.append(&genesis).unwrap();
        let cal1 = block(1, &genesis.hash, BlockType::Cal);
        store.append(&cal1).unwrap();
        let cal2 = block(2, &cal1.hash, BlockType::Cal);
        store.append(&cal2).unwrap();

        let last_cal = store.last_of_type(BlockType::Cal, "s1").unwrap().unwrap();
        assert_eq!(last_cal.id, 2);
        assert!(store.last_of_type(BlockType::BtcA, "s1").unwrap().is_none());
    }
}
