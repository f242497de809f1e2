//! Registered Node model.

use serde::{Deserialize, Serialize};

/// A participant Node as persisted by the Node Registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredNode {
    /// 40-hex-char, lowercased Ethereum address. Unique.
    pub tnt_addr: String,
    /// Absolute HTTP(S) URL at which the Node can be audited. Unique when present.
    pub public_uri: Option<String>,
    /// 32-byte hex HMAC key assigned at registration.
    pub hmac_key: String,
    /// Current token credit balance tracked by this registry.
    pub tnt_credit: i64,
    /// Total audit passes.
    pub pass_count: u64,
    /// Total audit failures.
    pub fail_count: u64,
    /// Current streak of consecutive passes.
    pub consecutive_passes: u64,
    /// Current streak of consecutive failures.
    pub consecutive_fails: u64,
    /// Reputation counter maintained by the Audit Engine.
    pub audit_score: u32,
    /// Node software version self-reported at registration/update time.
    pub version: String,
    /// Whether this Node has been blacklisted and is excluded from
    /// `randomHealthy` sampling and audit scheduling.
    pub blacklisted: bool,
}

impl RegisteredNode {
    /// Constructs a freshly registered Node with zeroed counters.
    pub fn new(tnt_addr: String, public_uri: Option<String>, hmac_key: String, version: String) -> Self {
        Self {
            tnt_addr,
            public_uri,
            hmac_key,
            tnt_credit: 0,
            pass_count: 0,
            fail_count: 0,
            consecutive_passes: 0,
            consecutive_fails: 0,
            audit_score: 0,
            version,
            blacklisted: false,
        }
    }

    /// Whether this Node currently counts as "active" for audit sampling.
    pub fn is_active(&self) -> bool {
        self.audit_score > 0
    }

    /// Whether this Node is eligible for `randomHealthy` sampling.
    pub fn is_healthy(&self) -> bool {
        self.consecutive_passes > 0
    }
}

/// One row of the audit log: the outcome of a single `audit_node` task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogRow {
    /// Address of the audited Node.
    pub tnt_addr: String,
    /// Time the audit round that produced this row ran, in epoch ms.
    pub audited_at_ms: i64,
    /// Whether the Node passed every predicate in.
    pub passed: bool,
    /// Which of the eight predicates failed, if any.
    pub failed_predicates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_node_is_inactive_and_unhealthy() {
        let n = RegisteredNode::new("a".repeat(40), None, "f".repeat(64), "1.0.0".into());
        assert!(!n.is_active());
        assert!(!n.is_healthy());
    }

    #[test]
    fn node_becomes_active_once_scored() {
        let mut n = RegisteredNode::new("a".repeat(40), None, "f".repeat(64), "1.0.0".into());
        n.audit_score = 1;
        assert!(n.is_active());
    }
}
