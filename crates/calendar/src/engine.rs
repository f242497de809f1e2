//! The Calendar Writer: aggregates one tick's worth of
//! aggregator submissions into a single `cal` block.
//!
//! Each tick is: acquire the stack's write lock, snapshot whatever has
//! accumulated since the last tick, build a Merkle tree over it, append
//! the resulting block (retrying up to [`retry::MAX_ATTEMPTS`] times on
//! transient store failures), emit one proof message per submission, then
//! release the lock. A tick with nothing queued is a no-op — there is no
//! empty `cal` block.

use crate::error::CalendarError;
use crate::retry;
use chronicle_bus::{queues, BusAdapter};
use chronicle_crypto::{sha256_hex, Signer};
use chronicle_lock::{LockClient, DEFAULT_TTL};
use chronicle_merkle::MerkleTree;
use chronicle_storage::BlockStore;
use chronicle_types::{AggregatorMsg, Block, BlockType, HashOp, ProofOp, StateMessage, BLOCK_VERSION};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};

/// A single aggregator submission awaiting the next tick, paired with a
/// channel the caller uses to learn whether to ack or nack (requeue) the
/// underlying bus delivery once the tick resolves.
pub struct PendingSubmission {
    /// The submission itself.
    pub msg: AggregatorMsg,
    /// Sends `true` once the tick that consumed this submission committed
    /// successfully, `false` if it should be requeued for the next tick.
    pub resolution: oneshot::Sender<bool>,
}

/// Ties the block store, lock service, bus, and signer together into the
/// per-tick aggregation engine for one Calendar stack.
pub struct CalendarEngine {
    stack_id: String,
    store: Arc<BlockStore>,
    lock: LockClient,
    bus: Arc<BusAdapter>,
    signer: Arc<Signer>,
    /// Base URI advertised in proof messages for fetching the produced block.
    anchor_uri_base: String,
}

/// Tick cadence: a fixed 10s period.
pub const TICK_INTERVAL: Duration = Duration::from_secs(10);

impl CalendarEngine {
    /// Builds an engine for `stack_id`, publishing proof URIs rooted at
    /// `anchor_uri_base` (e.g. `https://calendar.example.org`).
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
        format!("cal-lock:{}", self.stack_id)
    }

    /// Runs forever: waits a randomized 0-9s startup offset (so multiple
    /// stack instances don't all tick on the same wall-clock second), then
    /// ticks every [`TICK_INTERVAL`], draining whatever is waiting in
    /// `inbox` at each tick.
    pub async fn run(&self, mut inbox: mpsc::Receiver<PendingSubmission>) {
        let offset = Duration::from_secs(rand::thread_rng().gen_range(0..10));
        tokio::time::sleep(offset).await;

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            ticker.tick().await;
            let mut batch = Vec::new();
            while let Ok(item) = inbox.try_recv() {
                batch.push(item);
            }
            if batch.is_empty() {
                continue;
            }
            chronicle_telemetry::metrics::set_calendar_buffer_depth(batch.len() as i64);
            let started = Instant::now();
            let result = self.process_tick(&batch).await;
            chronicle_telemetry::metrics::observe_calendar_tick(started.elapsed().as_secs_f64());
            match &result {
                Ok(id) => tracing::info!(block_id = id, count = batch.len(), "calendar tick committed"),
                Err(e) => tracing::error!(error = %e, count = batch.len(), "calendar tick failed"),
            }
            let ok = result.is_ok();
            for item in batch {
                let _ = item.resolution.send(ok);
            }
        }
    }

    /// Runs one tick over `batch`, returning the id of the block it
    /// appended. Exposed directly so tests (and the `show-tip`-adjacent
    /// tooling) can drive a tick without the `run` loop's timing.
    pub async fn process_tick(
        &self,
        batch: &[PendingSubmission],
    ) -> Result<u64, CalendarError> {
        let lease = self
        .lock
        .acquire_with_retry(&self.lock_resource(), DEFAULT_TTL)
        .await?;
        let result = self.build_and_append(batch).await;
        // Best-effort release regardless of outcome; the lease's TTL
        // bounds how long a failed release can block the next writer.
        let _ = lease.release().await;
        result
    }

    async fn build_and_append(&self, batch: &[PendingSubmission]) -> Result<u64, CalendarError> {
        let mut leaves = Vec::with_capacity(batch.len());
        for item in batch {
            leaves.push(decode_root(&item.msg.agg_root));
        }
        let tree = MerkleTree::build(leaves, HashOp::Sha256)?;

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
            block_type: BlockType::Cal,
            data_id: id.to_string(),
            data_val: tree.root_hex(),
            prev_hash,
            hash: String::new(),
            sig: String::new(),
        };
        block.hash = sha256_hex(&block.hash_preimage());
        block.sig = self
        .signer
        .sign(&block.hash)
        .map_err(|e| CalendarError::Signing(e.to_string()))?;

        let store = Arc::clone(&self.store);
        let to_append = block.clone();
        retry::with_retry(|| {
                let store = Arc::clone(&store);
                let block = to_append.clone();
                async move { store.append(&block) }
        })
        .await?;

        let anchor_uri = format!("{}/calendar/{}/hash", self.anchor_uri_base, block.id);
        let header = format!(
            "{}:{}:{}:{}:{}:{}",
            block.id, block.time, block.version, block.stack_id, block.block_type, block.data_id
        );
        let block_binding_ops = vec![
            ProofOp::Left {
                l: hex::encode(header.as_bytes()),
            },
            ProofOp::Right {
                r: block.prev_hash.clone(),
            },
            ProofOp::Op { op: HashOp::Sha256 },
        ];
        for (i, item) in batch.iter().enumerate() {
            let mut ops = tree.proof(i)?;
            ops.extend(block_binding_ops.clone());
            let state = StateMessage::CalState {
                agg_id: item.msg.agg_id,
                ops,
                anchor_uri: anchor_uri.clone(),
            };
            self.bus.publish_json(queues::WORK_OUT_STATE, &state).await?;
        }

        Ok(block.id)
    }
}

fn decode_root(agg_root: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    if let Ok(bytes) = hex::decode(agg_root) {
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

#[cfg(test)]
mod tests {
    use super::*;

    // `build_and_append`/`process_tick` need a live lock backend and bus,
    // so the full tick is covered by the node crate's integration tests;
    // this crate's unit tests stick to the pure helpers.

    #[test]
    fn decode_root_pads_short_input() {
        let out = decode_root("aabb");
        assert_eq!(&out[..2], &[0xaa, 0xbb]);
        assert_eq!(&out[2..], &[0u8; 30]);
    }

    #[test]
    fn decode_root_truncates_long_input() {
        let long = "ab".repeat(40);
        let out = decode_root(&long);
        assert_eq!(out, [0xab; 32]);
    }

    #[test]
    fn tick_interval_matches_ten_seconds() {
        assert_eq!(TICK_INTERVAL, Duration::from_secs(10));
    }

    #[test]
    fn now_secs_is_a_plausible_unix_timestamp() {
        assert!(now_secs() > 1_700_000_000);
    }
}
