//! The Anchor Engine: the Bitcoin anchor path (merkle-aggregate
//! every block since the last anchor into one `btc-a` block), the
//! confirmation path (consume a buried-transaction report into a `btc-c`
//! block), and the tx pre-processing path (locate an aggregation root
//! inside a raw transaction body to emit a prefix/suffix proof segment).

use crate::error::AnchorError;
use crate::schedule::duration_until_next_boundary;
use chronicle_bus::{queues, BusAdapter};
use chronicle_crypto::{sha256_hex, Signer};
use chronicle_lock::{LockClient, DEFAULT_TTL};
use chronicle_merkle::MerkleTree;
use chronicle_storage::BlockStore;
use chronicle_types::{
    Block, BlockType, BtcMonMsg, BtcTxMsg, BtcTxRequest, HashOp, ProofOp, StateMessage,
    BLOCK_VERSION,
};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Ties the block store, lock service, bus, and signer together into the
/// anchor/confirm/pre-processing engine for one Calendar stack.
pub struct AnchorEngine {
    stack_id: String,
    store: Arc<BlockStore>,
    lock: LockClient,
    bus: Arc<BusAdapter>,
    signer: Arc<Signer>,
    anchor_uri_base: String,
}

impl AnchorEngine {
    /// Builds an engine for `stack_id`.
    pub fn new(
        stack_id: String,
        store: Arc<BlockStore>,
        lock: LockClient,
        bus: Arc<BusAdapter>,
        signer: Arc<Signer>,
        anchor_uri_base: String,
    ) -> Self {
        Self {
            stack_id,
            store,
            lock,
            bus,
            signer,
            anchor_uri_base,
        }
    }

    fn lock_resource(&self) -> String {
        // The anchor path appends to the same single-writer log the
        // Calendar writer does, so both contend for one lock per stack.
        format!("cal-lock:{}", self.stack_id)
    }

    /// Runs forever, firing [`Self::run_anchor_tick`] at every `:00`/`:30`
    /// UTC boundary.
    pub async fn run(&self) {
        loop {
            tokio::time::sleep(duration_until_next_boundary(SystemTime::now())).await;
            let started = Instant::now();
            let result = self.run_anchor_tick().await;
            chronicle_telemetry::metrics::observe_anchor_cycle(started.elapsed().as_secs_f64());
            match result {
                Ok(Some(id)) => tracing::info!(block_id = id, "anchor tick committed"),
                Ok(None) => tracing::debug!("anchor tick had nothing to anchor"),
                Err(e) => tracing::error!(error = %e, "anchor tick failed"),
            }
        }
    }

    /// Runs one anchor cycle, returning the id of the `btc-a` block it
    /// appended, or `None` if there was nothing new to anchor since the
    /// last cycle (a "quiet" anchor).
    pub async fn run_anchor_tick(&self) -> Result<Option<u64>, AnchorError> {
        let lease = self
        .lock
        .acquire_with_retry(&self.lock_resource(), DEFAULT_TTL)
        .await?;
        let result = self.build_and_append_anchor().await;
        let _ = lease.release().await;
        result
    }

    async fn build_and_append_anchor(&self) -> Result<Option<u64>, AnchorError> {
        let tip = match self.store.tip()? {
            Some(tip) => tip,
            None => return Ok(None),
        };
        let last_anchor = self.store.last_of_type(BlockType::BtcA, &self.stack_id)?;
        let start = last_anchor.map(|b| b.id + 1).unwrap_or(0);
        if start > tip.id {
            return Ok(None);
        }
        let blocks = self.store.scan(start..tip.id + 1, &[])?;
        if blocks.is_empty() {
            return Ok(None);
        }

        let leaves = blocks
        .iter()
        .map(|b| decode_hash(&b.hash))
        .collect::<Vec<_>>();
        let tree = MerkleTree::build(leaves, HashOp::Sha256)?;
        let agg_id = Uuid::new_v4();
        let root_hex = tree.root_hex();

        // Abort before writing anything if the downstream tx request can't
        // be published — an anchor block with no matching tx request is a
        // dead end no amount of retrying the publish later can fix cleanly.
        let tx_request = BtcTxRequest {
            anchor_btc_agg_id: agg_id,
            anchor_btc_agg_root: root_hex.clone(),
        };
        self.bus
        .publish_json(queues::WORK_OUT_BTCTX, &tx_request)
        .await?;

        let mut block = Block {
            id: tip.id + 1,
            time: now_secs(),
            version: BLOCK_VERSION,
            stack_id: self.stack_id.clone(),
            block_type: BlockType::BtcA,
            data_id: String::new(),
            data_val: root_hex,
            prev_hash: tip.hash.clone(),
            hash: String::new(),
            sig: String::new(),
        };
        block.hash = sha256_hex(&block.hash_preimage());
        block.sig = self
        .signer
        .sign(&block.hash)
        .map_err(|e| AnchorError::Signing(e.to_string()))?;
        self.store.append(&block)?;

        let anchor_uri = format!("{}/calendar/{}", self.anchor_uri_base, block.id);
        for (i, leaf_block) in blocks.iter().enumerate() {
            if leaf_block.block_type != BlockType::Cal {
                continue;
            }
            let ops = tree.proof(i)?;
            let state = StateMessage::AnchorBtcAgg {
                cal_block_id: leaf_block.id,
                ops,
                anchor_uri: anchor_uri.clone(),
            };
            self.bus.publish_json(queues::WORK_OUT_STATE, &state).await?;
        }

        Ok(Some(block.id))
    }

    /// Consumes one Bitcoin confirmation report, appending a `btc-c` block
    /// and publishing the proof binding the anchor tx to the confirming
    /// Bitcoin block. Callers should only ack the originating delivery
    /// after this returns `Ok`.
    pub async fn handle_confirm(&self, msg: &BtcMonMsg) -> Result<u64, AnchorError> {
        let lease = self
        .lock
        .acquire_with_retry(&self.lock_resource(), DEFAULT_TTL)
        .await?;
        let result = self.append_confirm(msg).await;
        let _ = lease.release().await;
        result
    }

    async fn append_confirm(&self, msg: &BtcMonMsg) -> Result<u64, AnchorError> {
        let tip = self
        .store
        .tip()?
        .ok_or_else(|| AnchorError::Store(chronicle_types::CoreError::NotFound(0)))?;

        let mut block = Block {
            id: tip.id + 1,
            time: now_secs(),
            version: BLOCK_VERSION,
            stack_id: self.stack_id.clone(),
            block_type: BlockType::BtcC,
            data_id: msg.btctx_id.clone(),
            data_val: msg.btchead_root.clone(),
            prev_hash: tip.hash.clone(),
            hash: String::new(),
            sig: String::new(),
        };
        block.hash = sha256_hex(&block.hash_preimage());
        block.sig = self
        .signer
        .sign(&block.hash)
        .map_err(|e| AnchorError::Signing(e.to_string()))?;
        self.store.append(&block)?;

        let anchor_uri = format!("{}/calendar/{}/data", self.anchor_uri_base, block.id);
        let state = StateMessage::BtcConfirmState {
            btc_c_id: block.id,
            ops: msg.path.clone(),
            anchor_uri,
        };
        self.bus.publish_json(queues::WORK_OUT_STATE, &state).await?;

        Ok(block.id)
    }
}

/// Locates `msg.agg_root` inside the raw transaction body and emits the
/// prefix/suffix proof segment binding the root to the transaction's
/// double-SHA256 id.
pub fn preprocess_btctx(msg: &BtcTxMsg) -> Result<StateMessage, AnchorError> {
    let tx_bytes =
    hex::decode(&msg.tx_body_hex).map_err(|_| AnchorError::RootNotFoundInTxBody)?;
    let root_bytes = hex::decode(&msg.agg_root).map_err(|_| AnchorError::RootNotFoundInTxBody)?;
    let idx = find_subslice(&tx_bytes, &root_bytes).ok_or(AnchorError::RootNotFoundInTxBody)?;
    let prefix = &tx_bytes[..idx];
    let suffix = &tx_bytes[idx + root_bytes.len()..];
    let ops = vec![
        ProofOp::Left {
            l: hex::encode(prefix),
        },
        ProofOp::Right {
            r: hex::encode(suffix),
        },
        ProofOp::Op {
            op: HashOp::Sha256x2,
        },
    ];
    Ok(StateMessage::BtcTxState {
            btctx_id: msg.btctx_id.clone(),
            ops,
    })
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decode_hash(hash_hex: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    if let Ok(bytes) = hex::decode(hash_hex) {
        let len = bytes.len().min(32);
        out[..len].copy_from_slice(&bytes[..len]);
    }
    out
}

fn now_secs() -> i64 {
    SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs() as i64
}
