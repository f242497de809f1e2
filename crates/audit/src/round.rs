//! The audit round: fans a per-Node task out to the bus, decays
//! scores for Nodes that have gone quiet, and schedules retention pruning.

use crate::error::AuditError;
use chronicle_bus::{queues, BusAdapter};
use chronicle_registry::NodeStore;
use chronicle_types::{AuditNodeTask, PruneMsg};
use std::time::{SystemTime, UNIX_EPOCH};

/// Rows older than this are eligible for pruning.
const RETENTION_MS: i64 = 6 * 60 * 60 * 1000;
/// Maximum rows the pruner deletes per scheduled batch.
const PRUNE_BATCH_SIZE: u32 = 500;

/// Tallies of one audit round, surfaced for logging/metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub tasks_enqueued: u64,
    pub decayed: u64,
    pub active_node_count: u64,
}

/// Runs one audit round: enqueues an `audit_node` task per Node with a
/// public URI, decays the score of every Node without one, and schedules a
/// pruning batch.
pub async fn run_round(
    node_store: &NodeStore,
    bus: &BusAdapter,
) -> Result<RoundSummary, AuditError> {
    let nodes = node_store.list_all()?;
    let active_node_count = nodes.iter().filter(|n| n.audit_score > 0).count() as u64;

    let mut tasks_enqueued = 0u64;
    let mut decayed = 0u64;
    for node in &nodes {
        match &node.public_uri {
            Some(public_uri) => {
                let task = AuditNodeTask {
                    tnt_addr: node.tnt_addr.clone(),
                    public_uri: public_uri.clone(),
                    active_node_count,
                };
                bus.publish_json(queues::WORK_OUT_AUDIT, &task).await?;
                tasks_enqueued += 1;
            }
            None => {
                let mut decayed_node = node.clone();
                decayed_node.audit_score = decayed_node.audit_score.saturating_sub(1);
                node_store.update(&decayed_node)?;
                decayed += 1;
            }
        }
    }

    let prune = PruneMsg {
        older_than_ms: now_ms() - RETENTION_MS,
        batch_size: PRUNE_BATCH_SIZE,
    };
    bus.publish_json(queues::TASK_HANDLER_QUEUE, &prune).await?;

    Ok(RoundSummary {
            tasks_enqueued,
            decayed,
            active_node_count,
    })
}

fn now_ms() -> i64 {
    SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as i64
}
