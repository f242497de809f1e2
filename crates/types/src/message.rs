//! Bus message bodies: UTF-8 JSON payloads multiplexed on a `type` tag.

use crate::proof::ProofSegment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything the core consumes off `work.in.cal`, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// A client-submitted aggregation root, destined for the Calendar Writer.
    Aggregator(AggregatorMsg),
    /// The Bitcoin tx service forwarding a raw tx body to pre-process.
    Btctx(BtcTxMsg),
    /// The Bitcoin monitor reporting that an anchor tx was buried.
    Btcmon(BtcMonMsg),
    /// A reward instruction for the Reward Engine.
    Reward(RewardMsg),
    /// An audit-log pruning request.
    Prune(PruneMsg),
}

/// One aggregation root submitted by an upstream aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorMsg {
    /// Unique id the aggregator assigned to this submission.
    pub agg_id: Uuid,
    /// 32-byte hex Merkle root of the aggregator's own client hashes.
    pub agg_root: String,
}

/// A raw Bitcoin transaction body awaiting prefix/suffix extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcTxMsg {
    /// Id assigned by the BTC tx service to this submission.
    pub btctx_id: String,
    /// The full raw transaction body, hex-encoded.
    pub tx_body_hex: String,
    /// The aggregation root expected to appear verbatim inside the tx body.
    pub agg_root: String,
}

/// A monitor report that an anchor transaction was included in a Bitcoin block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcMonMsg {
    /// Id of the anchor transaction being confirmed.
    pub btctx_id: String,
    /// Height of the Bitcoin block that buried the transaction.
    pub btchead_height: u64,
    /// Merkle root of the Bitcoin block header at that height.
    pub btchead_root: String,
    /// Proof segment binding the anchor tx to `btchead_root`.
    pub path: ProofSegment,
}

/// A reward instruction: transfer tokens to a Node and, optionally, a core wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardMsg {
    /// The Node-side transfer.
    pub node: RewardTarget,
    /// An optional, additional core-wallet transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core: Option<RewardTarget>,
}

/// One side of a reward transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardTarget {
    /// Recipient on-chain address.
    pub address: String,
    /// Amount to transfer, in the smallest on-chain unit (grains).
    pub amount: u64,
}

/// A request to prune audit-log rows older than a retention horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneMsg {
    /// Rows audited before this epoch-ms cutoff are eligible for deletion.
    pub older_than_ms: i64,
    /// Maximum number of rows to delete in one batch.
    pub batch_size: u32,
}

/// A per-Node audit task published to `task-handler-queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditNodeTask {
    /// The Node to audit.
    pub tnt_addr: String,
    /// The public URI to call.
    pub public_uri: String,
    /// Count of currently-active Nodes, forwarded for the task handler's
    /// own sampling/weighting decisions.
    pub active_node_count: u64,
}

/// Outbound proof-segment messages published to `work.out.state`, tagged
/// by `type` so a single queue can carry every pipeline stage's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateMessage {
    /// Binds one aggregation root to the calendar block that subsumed it.
    CalState {
        /// Id of the originating aggregation submission.
        agg_id: Uuid,
        /// Proof segment from `agg_root` to the calendar block hash.
        ops: ProofSegment,
        /// URI at which the calendar block can be fetched for verification.
        anchor_uri: String,
    },
    /// Binds one calendar block to the anchor aggregation root.
    AnchorBtcAgg {
        /// Id of the calendar block that is a leaf of the anchor tree.
        cal_block_id: u64,
        /// Proof segment from the calendar block hash to the anchor root.
        ops: ProofSegment,
        /// URI at which the anchor root can be fetched for verification.
        anchor_uri: String,
    },
    /// Binds a pre-processed Bitcoin tx body to its aggregation root.
    BtcTxState {
        /// Id of the Bitcoin transaction being pre-processed.
        btctx_id: String,
        /// Proof segment from the aggregation root to the raw tx body.
        ops: ProofSegment,
    },
    /// Binds an anchor transaction to the Bitcoin block that buried it.
    BtcConfirmState {
        /// Id of the `btc-c` block recording the confirmation.
        btc_c_id: u64,
        /// Proof segment from the anchor tx to the confirmed block.
        ops: ProofSegment,
        /// URI at which the confirmation block can be fetched for verification.
        anchor_uri: String,
    },
}

/// Outbound request published to `work.out.btctx` once an anchor root is ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcTxRequest {
    /// Fresh id assigned to this anchor cycle's aggregation.
    pub anchor_btc_agg_id: Uuid,
    /// 32-byte hex root to be committed to a Bitcoin transaction.
    pub anchor_btc_agg_root: String,
}

/// Outbound request published to `work.out.btcmon` asking the monitor to
/// watch for confirmation of a submitted transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcMonRequest {
    /// Id of the transaction to watch.
    pub tx_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_aggregator_round_trips() {
        let msg = InboundMessage::Aggregator(AggregatorMsg {
                agg_id: Uuid::nil(),
                agg_root: "aa".repeat(32),
        });
        let s = serde_json::to_string(&msg).unwrap();
        assert!(s.contains("\"type\":\"aggregator\""));
        let back: InboundMessage = serde_json::from_str(&s).unwrap();
        match back {
            InboundMessage::Aggregator(a) => assert_eq!(a.agg_root, "aa".repeat(32)),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn reward_msg_omits_absent_core_leg() {
        let msg = RewardMsg {
            node: RewardTarget {
                address: "a".repeat(40),
                amount: 10,
            },
            core: None,
        };
        let s = serde_json::to_string(&msg).unwrap();
        assert!(!s.contains("core"));
    }
}
