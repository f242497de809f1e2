//! Per-task audit result consumption: probes a Node, evaluates the
//! eight independent predicates, records a log row, and updates the Node's
//! aggregate counters and `auditScore`. Runs on every worker that picks up
//! an `audit_node` task, not gated by leader election.

use crate::challenge::ChallengeCache;
use crate::error::AuditError;
use crate::log::AuditLogStore;
use async_trait::async_trait;
use chronicle_crypto::hmac_auth;
use chronicle_registry::{version_lt, BalanceOracle, NodeStore};
use chronicle_types::{AuditLogRow, AuditNodeTask, RegisteredNode};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;

/// What a Node's audit endpoint reports about itself when probed.
#[derive(Debug, Clone)]
pub struct NodeAuditResponse {
    /// The IP address the probe observed the Node answering from.
    pub observed_ip: String,
    /// The Node's self-reported public URI.
    pub reported_public_uri: String,
    /// The Node's claimed solution to the current [`chronicle_types::AuditChallenge`].
    pub challenge_solution: String,
    /// `HMAC-SHA256(hmacKey, tntAddr || publicUri || "YYYYMMDDHHmm")`, computed
    /// against the Node's own clock.
    pub hmac: String,
    /// The Node's self-reported software version.
    pub version: String,
}

/// Dials a Node's public URI and retrieves its audit response. Abstracted
/// so tests can substitute canned responses instead of real network calls.
#[async_trait]
pub trait NodeProbe: Send + Sync {
    async fn probe(&self, node: &RegisteredNode) -> Result<NodeAuditResponse, AuditError>;
}

#[derive(serde::Deserialize)]
struct ProbeResponseBody {
    ip: String,
    public_uri: String,
    challenge_solution: String,
    hmac: String,
    version: String,
}

/// `GET {publicUri}/audit` against the real Node software.
pub struct HttpNodeProbe {
    client: reqwest::Client,
}

impl HttpNodeProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with a static config"),
        }
    }
}

impl Default for HttpNodeProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeProbe for HttpNodeProbe {
    async fn probe(&self, node: &RegisteredNode) -> Result<NodeAuditResponse, AuditError> {
        let base = node
        .public_uri
        .as_deref()
        .ok_or_else(|| AuditError::ProbeFailed("node has no public uri".into()))?;
        let body: ProbeResponseBody = self
        .client
        .get(format!("{base}/audit"))
        .send()
        .await
        .map_err(|e| AuditError::ProbeFailed(e.to_string()))?
        .error_for_status()
        .map_err(|e| AuditError::ProbeFailed(e.to_string()))?
        .json()
        .await
        .map_err(|e| AuditError::ProbeFailed(e.to_string()))?;
        Ok(NodeAuditResponse {
                observed_ip: body.ip,
                reported_public_uri: body.public_uri,
                challenge_solution: body.challenge_solution,
                hmac: body.hmac,
                version: body.version,
        })
    }
}

/// Thresholds the eight predicates are checked against.
pub struct AuditThresholds {
    pub min_credits: i64,
    pub min_version: String,
    pub min_balance: i64,
}

/// Evaluates one `audit_node` task end to end and persists the outcome.
pub struct AuditWorker {
    node_store: Arc<NodeStore>,
    log_store: Arc<AuditLogStore>,
    challenges: Arc<ChallengeCache>,
    probe: Arc<dyn NodeProbe>,
    balances: Arc<dyn BalanceOracle>,
    thresholds: AuditThresholds,
}

impl AuditWorker {
    pub fn new(
        node_store: Arc<NodeStore>,
        log_store: Arc<AuditLogStore>,
        challenges: Arc<ChallengeCache>,
        probe: Arc<dyn NodeProbe>,
        balances: Arc<dyn BalanceOracle>,
        thresholds: AuditThresholds,
    ) -> Self {
        Self {
            node_store,
            log_store,
            challenges,
            probe,
            balances,
            thresholds,
        }
    }

    /// Probes the task's Node, evaluates all eight predicates (or records a
    /// single "unreachable" failure if the probe itself fails), updates the
    /// Node's counters, and appends the resulting row.
    pub async fn handle_task(&self, task: &AuditNodeTask) -> Result<AuditLogRow, AuditError> {
        let node = self
        .node_store
        .get(&task.tnt_addr)?
        .ok_or_else(|| AuditError::UnknownNode(task.tnt_addr.clone()))?;

        let row = match self.probe.probe(&node).await {
            Ok(response) => self.evaluate(&node, &response).await?,
            Err(_) => AuditLogRow {
                tnt_addr: node.tnt_addr.clone(),
                audited_at_ms: now_ms(),
                passed: false,
                failed_predicates: vec!["reachable".into()],
            },
        };

        if row.passed {
            chronicle_telemetry::metrics::inc_audit_pass();
        } else {
            chronicle_telemetry::metrics::inc_audit_fail();
        }
        self.apply_outcome(&node, &row)?;
        self.log_store.insert(&row)?;
        Ok(row)
    }

    async fn evaluate(
        &self,
        node: &RegisteredNode,
        response: &NodeAuditResponse,
    ) -> Result<AuditLogRow, AuditError> {
        let mut failed = Vec::new();

        let registered_ip = node.public_uri.as_deref().and_then(extract_host);
        if registered_ip.as_deref() != Some(response.observed_ip.as_str()) {
            failed.push("ip_match".to_string());
        }

        if node.public_uri.as_deref() != Some(response.reported_public_uri.as_str()) {
            failed.push("uri_match".to_string());
        }

        let verify_uri = node.public_uri.clone().unwrap_or_default();
        let clock_ok = hmac_auth::verify_in_window(
            node.hmac_key.as_bytes(),
            &node.tnt_addr,
            &verify_uri,
            OffsetDateTime::now_utc(),
            &response.hmac,
        )
        .is_ok();
        if !clock_ok {
            failed.push("clock_skew".to_string());
        }

        let challenge = self.challenges.get().ok_or(AuditError::NoChallengeCached)?;
        if response.challenge_solution != challenge.solution {
            failed.push("solution".to_string());
        }

        if node.tnt_credit < self.thresholds.min_credits {
            failed.push("credits".to_string());
        }

        if version_lt(&response.version, &self.thresholds.min_version) {
            failed.push("version".to_string());
        }

        let balance = self.balances.balance(&node.tnt_addr).await?;
        if balance < self.thresholds.min_balance {
            failed.push("balance".to_string());
        }

        Ok(AuditLogRow {
                tnt_addr: node.tnt_addr.clone(),
                audited_at_ms: now_ms(),
                passed: failed.is_empty(),
                failed_predicates: failed,
        })
    }

    fn apply_outcome(&self, node: &RegisteredNode, row: &AuditLogRow) -> Result<(), AuditError> {
        let mut updated = node.clone();
        if row.passed {
            updated.pass_count += 1;
            updated.consecutive_passes += 1;
            updated.consecutive_fails = 0;
            updated.audit_score = updated.audit_score.saturating_add(1);
        } else {
            updated.fail_count += 1;
            updated.consecutive_fails += 1;
            updated.consecutive_passes = 0;
            updated.audit_score = updated.audit_score.saturating_sub(1);
        }
        self.node_store.update(&updated)?;
        Ok(())
    }
}

/// Pulls the bare host (IP, since registered URIs are always bare IPs) out
/// of an absolute `http(s)://host[:port]/...` URI.
fn extract_host(uri: &str) -> Option<String> {
    let (_, rest) = uri.split_once("://")?;
    let authority = rest.split('/').next().unwrap_or(rest);
    let host = if let Some(stripped) = authority.strip_prefix('[') {
        stripped.split(']').next().unwrap_or(stripped)
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
            _ => authority,
        }
    };
    Some(host.to_string())
}

fn now_ms() -> i64 {
    SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_registry::RegistryError;
    use tempfile::tempdir;

    struct FixedProbe(NodeAuditResponse);

    #[async_trait]
    impl NodeProbe for FixedProbe {
        async fn probe(&self, _node: &RegisteredNode) -> Result<NodeAuditResponse, AuditError> {
            Ok(self.0.clone())
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl NodeProbe for FailingProbe {
        async fn probe(&self, _node: &RegisteredNode) -> Result<NodeAuditResponse, AuditError> {
            Err(AuditError::ProbeFailed("connection refused".into()))
        }
    }

    struct FixedBalance(i64);

    #[async_trait]
    impl BalanceOracle for FixedBalance {
        async fn balance(&self, _tnt_addr: &str) -> Result<i64, RegistryError> {
            Ok(self.0)
        }
    }

    fn node_with_uri() -> RegisteredNode {
        let mut n = RegisteredNode::new(
            "a".repeat(40),
            Some("https://203.0.113.10:8080/".into()),
            "f".repeat(64),
            "1.0.0".into(),
        );
        n.tnt_credit = 1_000;
        n
    }

    fn worker(
        dir: &tempfile::TempDir,
        probe: Arc<dyn NodeProbe>,
        balance: i64,
    ) -> (AuditWorker, Arc<NodeStore>) {
        let node_store = Arc::new(NodeStore::open(dir.path().join("registry.redb")).unwrap());
        let log_store = Arc::new(AuditLogStore::open(dir.path().join("audit_log.redb")).unwrap());
        let challenges = Arc::new(ChallengeCache::new());
        challenges.set(chronicle_types::AuditChallenge {
                time: 1,
                min_block_height: 0,
                max_block_height: 1,
                nonce: "aa".repeat(32),
                solution: "cc".repeat(32),
        });
        let worker = AuditWorker::new(
            node_store.clone(),
            log_store,
            challenges,
            probe,
            Arc::new(FixedBalance(balance)),
            AuditThresholds {
                min_credits: 100,
                min_version: "1.0.0".into(),
                min_balance: 100,
            },
        );
        (worker, node_store)
    }

    fn valid_response() -> NodeAuditResponse {
        let node = node_with_uri();
        let now = OffsetDateTime::now_utc();
        let minute = hmac_auth::format_minute(now);
        let mac = hmac_auth::compute(
            node.hmac_key.as_bytes(),
            &node.tnt_addr,
            node.public_uri.as_deref().unwrap(),
            &minute,
        );
        NodeAuditResponse {
            observed_ip: "203.0.113.10".into(),
            reported_public_uri: node.public_uri.unwrap(),
            challenge_solution: "cc".repeat(32),
            hmac: mac,
            version: "1.0.0".into(),
        }
    }

    #[tokio::test]
    async fn all_predicates_passing_records_a_pass_and_raises_score() {
        let dir = tempdir().unwrap();
        let node = node_with_uri();
        let (worker, store) = worker(&dir, Arc::new(FixedProbe(valid_response())), 1_000);
        store.insert(&node).unwrap();

        let row = worker
        .handle_task(&AuditNodeTask {
                tnt_addr: node.tnt_addr.clone(),
                public_uri: node.public_uri.clone().unwrap(),
                active_node_count: 1,
        })
        .await
        .unwrap();
        assert!(row.passed);
        assert!(row.failed_predicates.is_empty());
        let updated = store.get(&node.tnt_addr).unwrap().unwrap();
        assert_eq!(updated.consecutive_passes, 1);
        assert_eq!(updated.audit_score, 1);
    }

    #[tokio::test]
    async fn wrong_solution_fails_just_that_predicate() {
        let dir = tempdir().unwrap();
        let node = node_with_uri();
        let mut response = valid_response();
        response.challenge_solution = "ff".repeat(32);
        let (worker, store) = worker(&dir, Arc::new(FixedProbe(response)), 1_000);
        store.insert(&node).unwrap();

        let row = worker
        .handle_task(&AuditNodeTask {
                tnt_addr: node.tnt_addr.clone(),
                public_uri: node.public_uri.clone().unwrap(),
                active_node_count: 1,
        })
        .await
        .unwrap();
        assert!(!row.passed);
        assert_eq!(row.failed_predicates, vec!["solution".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_node_records_a_single_reachable_failure() {
        let dir = tempdir().unwrap();
        let node = node_with_uri();
        let (worker, store) = worker(&dir, Arc::new(FailingProbe), 1_000);
        store.insert(&node).unwrap();

        let row = worker
        .handle_task(&AuditNodeTask {
                tnt_addr: node.tnt_addr.clone(),
                public_uri: node.public_uri.clone().unwrap(),
                active_node_count: 1,
        })
        .await
        .unwrap();
        assert!(!row.passed);
        assert_eq!(row.failed_predicates, vec!["reachable".to_string()]);
        let updated = store.get(&node.tnt_addr).unwrap().unwrap();
        assert_eq!(updated.consecutive_fails, 1);
    }

    #[test]
    fn extract_host_strips_scheme_and_port() {
        assert_eq!(
            extract_host("https://203.0.113.10:8443/node"),
            Some("203.0.113.10".to_string())
        );
    }
}
