//! Registration and update flows for the Node Registry, sitting
//! between the HTTP surface and the [`NodeStore`].

use crate::store::NodeStore;
use crate::validate::validate_public_uri;
use async_trait::async_trait;
use chronicle_crypto::hmac_auth;
use chronicle_types::{RegisteredNode, RegistryError};
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Looks up a Node's on-chain token balance. Abstracted behind a trait so
/// tests can substitute a fixed value instead of dialing the token service.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    async fn balance(&self, tnt_addr: &str) -> Result<i64, RegistryError>;
}

/// `GET /balance/:addr` against the external token service.
pub struct HttpBalanceOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBalanceOracle {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with a static config"),
            base_url,
        }
    }
}

#[derive(serde::Deserialize)]
struct BalanceResponse {
    balance: i64,
}

#[async_trait]
impl BalanceOracle for HttpBalanceOracle {
    async fn balance(&self, tnt_addr: &str) -> Result<i64, RegistryError> {
        let url = format!("{}/balance/{tnt_addr}", self.base_url);
        let resp = self
        .client
        .get(&url)
        .send()
        .await
        .map_err(|e| RegistryError::Internal(format!("balance lookup failed: {e}")))?
        .error_for_status()
        .map_err(|e| RegistryError::Internal(format!("balance lookup failed: {e}")))?
        .json::<BalanceResponse>()
        .await
        .map_err(|e| RegistryError::Internal(format!("malformed balance response: {e}")))?;
        Ok(resp.balance)
    }
}

/// Registration and update policy, configured once at startup.
pub struct RegistryConfig {
    /// Maximum total registered Nodes.
    pub cap: u64,
    /// Minimum on-chain balance, in grains, required to register or remain
    /// registered.
    pub min_balance: i64,
    /// Minimum accepted `x-node-version` for new registrations.
    pub min_new_version: String,
    /// Minimum accepted `x-node-version` for updates to existing Nodes.
    pub min_existing_version: String,
}

/// Orchestrates `create`/`update` against the store, the balance oracle,
/// and HMAC verification.
pub struct RegistryService {
    store: Arc<NodeStore>,
    balances: Arc<dyn BalanceOracle>,
    config: RegistryConfig,
}

impl RegistryService {
    pub fn new(store: Arc<NodeStore>, balances: Arc<dyn BalanceOracle>, config: RegistryConfig) -> Self {
        Self {
            store,
            balances,
            config,
        }
    }

    /// `create(tntAddr, publicUri?, version)`: assigns a fresh HMAC
    /// key, double-checks the registration cap, and validates balance.
    pub async fn create(
        &self,
        tnt_addr: &str,
        public_uri: Option<String>,
        version: &str,
    ) -> Result<RegisteredNode, RegistryError> {
        if version_lt(version, &self.config.min_new_version) {
            return Err(RegistryError::UpgradeRequired(format!(
                        "node version {version} below required {}",
                        self.config.min_new_version
            )));
        }
        let tnt_addr = normalize_addr(tnt_addr)?;
        let public_uri = public_uri.map(|u| validate_public_uri(&u)).transpose()?;

        // First cap check, before the (potentially slow) balance lookup.
        if self.store.count()? >= self.config.cap {
            return Err(RegistryError::Forbidden("registration cap reached".into()));
        }

        let balance = self.balances.balance(&tnt_addr).await?;
        if balance < self.config.min_balance {
            return Err(RegistryError::Forbidden(format!(
                        "balance {balance} below required {}",
                        self.config.min_balance
            )));
        }

        // Authoritative cap check, immediately before insertion.
        if self.store.count()? >= self.config.cap {
            return Err(RegistryError::Forbidden("registration cap reached".into()));
        }

        let hmac_key = fresh_hmac_key();
        let node = RegisteredNode::new(tnt_addr, public_uri, hmac_key, version.to_string());
        self.store.insert(&node)?;
        Ok(node)
    }

    /// `update(tntAddr, publicUri?, hmac, version)`: verifies the
    /// caller's HMAC against the `{-1,0,+1}` minute window, then re-checks
    /// balance before persisting.
    pub async fn update(
        &self,
        tnt_addr: &str,
        public_uri: Option<String>,
        hmac: &str,
        version: &str,
    ) -> Result<RegisteredNode, RegistryError> {
        if version_lt(version, &self.config.min_existing_version) {
            return Err(RegistryError::UpgradeRequired(format!(
                        "node version {version} below required {}",
                        self.config.min_existing_version
            )));
        }
        let tnt_addr = normalize_addr(tnt_addr)?;
        let mut node = self
        .store
        .get(&tnt_addr)?
        .ok_or_else(|| RegistryError::NotFound(format!("no node registered at {tnt_addr}")))?;

        let public_uri = public_uri.map(|u| validate_public_uri(&u)).transpose()?;
        let verify_uri = public_uri.clone().or_else(|| node.public_uri.clone()).unwrap_or_default();
        hmac_auth::verify_in_window(
            node.hmac_key.as_bytes(),
            &tnt_addr,
            &verify_uri,
            OffsetDateTime::now_utc(),
            hmac,
        )
        .map_err(|e| RegistryError::AuthFailure(e.to_string()))?;

        let balance = self.balances.balance(&tnt_addr).await?;
        if balance < self.config.min_balance {
            return Err(RegistryError::Forbidden(format!(
                        "balance {balance} below required {}",
                        self.config.min_balance
            )));
        }

        if let Some(uri) = public_uri {
            node.public_uri = Some(uri);
        }
        node.version = version.to_string();
        self.store.update(&node)?;
        Ok(node)
    }

    /// `randomHealthy(n=25)`.
    pub fn random_healthy(&self, n: usize) -> Result<Vec<RegisteredNode>, RegistryError> {
        self.store.random_healthy(n)
    }

    /// Raises every non-blacklisted Node's `tntCredit` up to `floor`,
    /// leaving Nodes already at or above it untouched. Run once every 24h
    /// by a low-cadence scheduled task.
    pub fn top_off_credits(&self, floor: i64) -> Result<u64, RegistryError> {
        let mut topped_off = 0u64;
        for mut node in self.store.list_all()? {
            if node.blacklisted || node.tnt_credit >= floor {
                continue;
            }
            node.tnt_credit = floor;
            self.store.update(&node)?;
            topped_off += 1;
        }
        Ok(topped_off)
    }

    /// `blacklist()`.
    pub fn blacklist(&self) -> Result<Vec<String>, RegistryError> {
        self.store.blacklist()
    }
}

fn normalize_addr(tnt_addr: &str) -> Result<String, RegistryError> {
    let addr = tnt_addr.to_ascii_lowercase();
    if addr.len() != 40 || !addr.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RegistryError::InvalidArgument(format!(
                    "not a 40-hex-char address: {tnt_addr}"
        )));
    }
    Ok(addr)
}

fn fresh_hmac_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compares dotted version strings component-wise; a shorter string is
/// treated as zero-padded (`"1.2" < "1.2.1"`).
pub fn version_lt(have: &str, min: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.').map(|p| p.parse().unwrap_or(0)).collect()
    };
    let (have, min) = (parse(have), parse(min));
    let len = have.len().max(min.len());
    for i in 0..len {
        let h = have.get(i).copied().unwrap_or(0);
        let m = min.get(i).copied().unwrap_or(0);
        if h != m {
            return h < m;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FixedBalance(i64);

    #[async_trait]
    impl BalanceOracle for FixedBalance {
        async fn balance(&self, _tnt_addr: &str) -> Result<i64, RegistryError> {
            Ok(self.0)
        }
    }

    fn service(dir: &tempfile::TempDir, balance: i64, cap: u64) -> RegistryService {
        let store = Arc::new(NodeStore::open(dir.path().join("registry.redb")).unwrap());
        RegistryService::new(
            store,
            Arc::new(FixedBalance(balance)),
            RegistryConfig {
                cap,
                min_balance: 100,
                min_new_version: "1.0.0".into(),
                min_existing_version: "1.0.0".into(),
            },
        )
    }

    #[tokio::test]
    async fn create_assigns_a_fresh_hmac_key() {
        let dir = tempdir().unwrap();
        let svc = service(&dir, 1_000, 10);
        let node = svc
        .create(&"a".repeat(40), Some("https://203.0.113.10/".into()), "1.0.0")
        .await
        .unwrap();
        assert_eq!(node.hmac_key.len(), 64);
    }

    #[tokio::test]
    async fn create_rejects_low_version() {
        let dir = tempdir().unwrap();
        let svc = service(&dir, 1_000, 10);
        assert!(matches!(
                svc.create(&"a".repeat(40), None, "0.9.0").await,
                Err(RegistryError::UpgradeRequired(_))
        ));
    }

    #[tokio::test]
    async fn create_rejects_insufficient_balance() {
        let dir = tempdir().unwrap();
        let svc = service(&dir, 10, 10);
        assert!(matches!(
                svc.create(&"a".repeat(40), None, "1.0.0").await,
                Err(RegistryError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn create_rejects_when_cap_reached() {
        let dir = tempdir().unwrap();
        let svc = service(&dir, 1_000, 1);
        svc.create(&"a".repeat(40), None, "1.0.0").await.unwrap();
        assert!(matches!(
                svc.create(&"b".repeat(40), None, "1.0.0").await,
                Err(RegistryError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn update_requires_valid_hmac() {
        let dir = tempdir().unwrap();
        let svc = service(&dir, 1_000, 10);
        let node = svc.create(&"a".repeat(40), None, "1.0.0").await.unwrap();
        assert!(matches!(
                svc.update(&node.tnt_addr, None, "not-a-real-hmac", "1.0.0").await,
                Err(RegistryError::AuthFailure(_))
        ));
    }

    #[tokio::test]
    async fn update_accepts_valid_hmac_and_changes_uri() {
        let dir = tempdir().unwrap();
        let svc = service(&dir, 1_000, 10);
        let node = svc.create(&"a".repeat(40), None, "1.0.0").await.unwrap();
        let new_uri = "https://203.0.113.20/";
        let now = OffsetDateTime::now_utc();
        let minute = hmac_auth::format_minute(now);
        let mac = hmac_auth::compute(node.hmac_key.as_bytes(), &node.tnt_addr, new_uri, &minute);
        let updated = svc
        .update(&node.tnt_addr, Some(new_uri.to_string()), &mac, "1.0.0")
        .await
        .unwrap();
        assert_eq!(updated.public_uri.as_deref(), Some(new_uri));
    }

    #[test]
    fn version_lt_compares_dotted_components() {
        assert!(version_lt("1.2.0", "1.3.0"));
        assert!(!version_lt("1.3.0", "1.2.9"));
        assert!(version_lt("1.2", "1.2.1"));
        assert!(!version_lt("1.2.0", "1.2"));
    }

    #[tokio::test]
    async fn top_off_credits_raises_only_nodes_below_the_floor() {
        let dir = tempdir().unwrap();
        let svc = service(&dir, 1_000, 10);
        let low = svc.create(&"a".repeat(40), None, "1.0.0").await.unwrap();
        let high = svc.create(&"b".repeat(40), None, "1.0.0").await.unwrap();
        let mut high = high;
        high.tnt_credit = 50;
        svc.store.update(&high).unwrap();

        let topped_off = svc.top_off_credits(20).unwrap();
        assert_eq!(topped_off, 1);
        assert_eq!(svc.store.get(&low.tnt_addr).unwrap().unwrap().tnt_credit, 20);
        assert_eq!(svc.store.get(&high.tnt_addr).unwrap().unwrap().tnt_credit, 50);
    }
}
