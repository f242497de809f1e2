//! The Reward Engine: consumes a [`RewardMsg`], attempts the
//! node (and optional core) token transfers, and appends a `reward` block
//! recording whichever legs actually succeeded.

use crate::transfer::TokenTransferClient;
use chronicle_crypto::{sha256_hex, Signer};
use chronicle_storage::BlockStore;
use chronicle_types::{Block, BlockType, CoreError, RewardError, RewardMsg, BLOCK_VERSION};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Ties the block store, signer, and token transfer client together for
/// one Calendar stack's reward path.
pub struct RewardEngine {
    stack_id: String,
    store: Arc<BlockStore>,
    signer: Arc<Signer>,
    transfers: Arc<dyn TokenTransferClient>,
}

impl RewardEngine {
    pub fn new(
        stack_id: String,
        store: Arc<BlockStore>,
        signer: Arc<Signer>,
        transfers: Arc<dyn TokenTransferClient>,
    ) -> Self {
        Self {
            stack_id,
            store,
            signer,
            transfers,
        }
    }

    /// Processes one reward message, returning the appended block's id.
    ///
    /// A failed node transfer leaves nothing worth recording, so no block
    /// is appended and `Ok(None)` is returned; a failed *core* transfer is
    /// logged and simply omitted from the block, since the node leg alone
    /// is still worth recording. Either way the caller should ack the
    /// originating delivery regardless of the outcome here — retrying a
    /// transfer on redelivery risks paying twice.
    pub async fn process(&self, msg: &RewardMsg) -> Result<Option<u64>, RewardError> {
        let node_tx = match self.transfers.transfer(&msg.node.address, msg.node.amount).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!(error = %e, address = %msg.node.address, "node reward transfer failed");
                return Ok(None);
            }
        };

        let mut data_id = node_tx;
        let mut data_val = format!("{}:{}", msg.node.address, msg.node.amount);

        if let Some(core) = &msg.core {
            match self.transfers.transfer(&core.address, core.amount).await {
                Ok(core_tx) => {
                    data_id = format!("{data_id}:{core_tx}");
                    data_val = format!("{data_val}:{}:{}", core.address, core.amount);
                }
                Err(e) => {
                    tracing::error!(error = %e, address = %core.address, "core reward transfer failed");
                }
            }
        }

        let block = self.build_block(data_id, data_val)?;
        self.store.append(&block)?;
        Ok(Some(block.id))
    }

    fn build_block(&self, data_id: String, data_val: String) -> Result<Block, RewardError> {
        let tip = self.store.tip()?;
        let (id, prev_hash) = match &tip {
            Some(tip) => (tip.id + 1, tip.hash.clone()),
            None => (0, chronicle_types::block::zero_hash()),
        };
        let mut block = Block {
            id,
            time: now_secs(),
            version: BLOCK_VERSION,
            stack_id: self.stack_id.clone(),
            block_type: BlockType::Reward,
            data_id,
            data_val,
            prev_hash,
            hash: String::new(),
            sig: String::new(),
        };
        block.hash = sha256_hex(&block.hash_preimage());
        block.sig = self
        .signer
        .sign(&block.hash)
        .map_err(|e| RewardError::AppendFailed(CoreError::Crypto(e.to_string())))?;
        Ok(block)
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::test_support::{FailingTransferClient, FixedTransferClient};
    use chronicle_crypto::Signer;
    use chronicle_types::RewardTarget;

    fn engine(store: Arc<BlockStore>, transfers: Arc<dyn TokenTransferClient>) -> RewardEngine {
        RewardEngine::new(
            "stack1".into(),
            store,
            Arc::new(Signer::generate().unwrap()),
            transfers,
        )
    }

    fn open_store() -> Arc<BlockStore> {
        let dir = tempfile::tempdir().unwrap();
        Arc::new(BlockStore::open(dir.path().join("blocks.redb")).unwrap())
    }

    #[tokio::test]
    async fn successful_node_only_transfer_appends_reward_block() {
        let store = open_store();
        let eng = engine(Arc::clone(&store), Arc::new(FixedTransferClient::new()));
        let msg = RewardMsg {
            node: RewardTarget {
                address: "a".repeat(40),
                amount: 100,
            },
            core: None,
        };
        let id = eng.process(&msg).await.unwrap().unwrap();
        let block = store.by_id(id).unwrap().unwrap();
        assert_eq!(block.block_type, BlockType::Reward);
        assert_eq!(block.data_id, "tx0");
        assert_eq!(block.data_val, format!("{}:100", "a".repeat(40)));
    }

    #[tokio::test]
    async fn successful_node_and_core_transfer_joins_both_ids() {
        let store = open_store();
        let eng = engine(Arc::clone(&store), Arc::new(FixedTransferClient::new()));
        let msg = RewardMsg {
            node: RewardTarget {
                address: "a".repeat(40),
                amount: 100,
            },
            core: Some(RewardTarget {
                    address: "b".repeat(40),
                    amount: 50,
            }),
        };
        let id = eng.process(&msg).await.unwrap().unwrap();
        let block = store.by_id(id).unwrap().unwrap();
        assert_eq!(block.data_id, "tx0:tx1");
        assert_eq!(
            block.data_val,
            format!("{}:100:{}:50", "a".repeat(40), "b".repeat(40))
        );
    }

    #[tokio::test]
    async fn failed_node_transfer_appends_no_block() {
        let store = open_store();
        let eng = engine(Arc::clone(&store), Arc::new(FailingTransferClient));
        let msg = RewardMsg {
            node: RewardTarget {
                address: "a".repeat(40),
                amount: 100,
            },
            core: None,
        };
        let result = eng.process(&msg).await.unwrap();
        assert!(result.is_none());
        assert!(store.tip().unwrap().is_none());
    }

    #[tokio::test]
    async fn reward_block_chains_onto_existing_tip() {
        let store = open_store();
        let genesis = Block {
            id: 0,
            time: 0,
            version: BLOCK_VERSION,
            stack_id: "stack1".into(),
            block_type: BlockType::Gen,
            data_id: "0".into(),
            data_val: chronicle_types::block::zero_hash(),
            prev_hash: chronicle_types::block::zero_hash(),
            hash: sha256_hex(
                &Block {
                    id: 0,
                    time: 0,
                    version: BLOCK_VERSION,
                    stack_id: "stack1".into(),
                    block_type: BlockType::Gen,
                    data_id: "0".into(),
                    data_val: chronicle_types::block::zero_hash(),
                    prev_hash: chronicle_types::block::zero_hash(),
                    hash: String::new(),
                    sig: String::new(),
                }
                .hash_preimage(),
            ),
            sig: "sig".into(),
        };
        store.append(&genesis).unwrap();

        let eng = engine(Arc::clone(&store), Arc::new(FixedTransferClient::new()));
        let msg = RewardMsg {
            node: RewardTarget {
                address: "a".repeat(40),
                amount: 1,
            },
            core: None,
        };
        let id = eng.process(&msg).await.unwrap().unwrap();
        assert_eq!(id, 1);
        let block = store.by_id(1).unwrap().unwrap();
        assert_eq!(block.prev_hash, genesis.hash);
    }
}
