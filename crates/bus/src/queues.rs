//! The fixed queue topology the Calendar engine's workers communicate over.

/// Aggregator submissions awaiting inclusion in the next Calendar tick.
pub const WORK_IN_CAL: &str = "work.in.cal";
/// Calendar/anchor state notifications consumed by downstream listeners.
pub const WORK_OUT_STATE: &str = "work.out.state";
/// Bitcoin transaction requests produced by the anchor engine.
pub const WORK_OUT_BTCTX: &str = "work.out.btctx";
/// Bitcoin confirmation-monitoring requests produced by the anchor engine.
pub const WORK_OUT_BTCMON: &str = "work.out.btcmon";
/// Audit challenge tasks fanned out to Node audit workers.
pub const WORK_OUT_AUDIT: &str = "work.out.audit";
/// Generic task-handler fan-out queue (credit top-off, pruning batches).
pub const TASK_HANDLER_QUEUE: &str = "task-handler-queue";
