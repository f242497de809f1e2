//! Errors surfaced by the Audit Engine's challenge generation, round
//! scheduling, and per-task result consumption paths.

use chronicle_types::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// The lock or leader-election backend could not be reached.
    #[error("lock error: {0}")]
    Lock(#[from] chronicle_lock::LockError),
    /// The block store rejected a read.
    #[error("store error: {0}")]
    Store(#[from] chronicle_types::CoreError),
    /// The merkle builder rejected a challenge batch.
    #[error("merkle error: {0}")]
    Merkle(#[from] chronicle_merkle::MerkleError),
    /// The bus could not accept a required publish.
    #[error("bus error: {0}")]
    Bus(#[from] chronicle_bus::BusError),
    /// The node registry rejected a read or write.
    #[error("registry error: {0}")]
    Registry(#[from] chronicle_types::RegistryError),
    /// A challenge was requested for an empty Calendar.
    #[error("cannot generate a challenge over an empty calendar")]
    EmptyCalendar,
    /// No challenge has been cached yet, so a task cannot be evaluated.
    #[error("no audit challenge is currently cached")]
    NoChallengeCached,
    /// An `audit_node` task named a Node not present in the registry.
    #[error("unknown node: {0}")]
    UnknownNode(String),
    /// The Node could not be reached, or returned a malformed response.
    #[error("node probe failed: {0}")]
    ProbeFailed(String),
}

impl ErrorCode for AuditError {
    fn code(&self) -> &'static str {
        match self {
            Self::Lock(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Merkle(_) => "MERKLE_BUILD_FAILED",
            Self::Bus(e) => e.code(),
            Self::Registry(e) => e.code(),
            Self::EmptyCalendar => "AUDIT_EMPTY_CALENDAR",
            Self::NoChallengeCached => "AUDIT_NO_CHALLENGE",
            Self::UnknownNode(_) => "AUDIT_UNKNOWN_NODE",
            Self::ProbeFailed(_) => "AUDIT_PROBE_FAILED",
        }
    }
}
