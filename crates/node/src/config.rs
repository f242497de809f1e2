//! Node process configuration: a TOML file on disk, overridable by a
//! handful of environment variables for the secrets an operator would
//! rather not commit to a config file.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Top-level configuration for one `chronicle-node` process.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Opaque id of this deployment, stamped into every block's `stackId`.
    pub stack_id: String,
    /// Directory holding this stack's `redb` databases.
    pub data_dir: PathBuf,
    /// AMQP connection string for the message bus.
    pub amqp_url: String,
    /// Redis connection string for the lock service.
    pub redis_url: String,
    /// Base URI advertised in proof messages (`{base}/calendar/{id}`).
    pub anchor_uri_base: String,
    /// Base64-encoded 32-byte Ed25519 seed for this process's signing identity.
    pub signing_key_seed_b64: String,
    /// Floor every registered Node's `tntCredit` is topped off to, daily.
    pub credit_top_off_floor: i64,
    /// Node Registry policy and dependencies.
    pub registry: RegistryConfig,
    /// Audit Engine cadence and pass thresholds.
    pub audit: AuditConfig,
    /// Reward Engine's token service.
    pub reward: RewardConfig,
    /// Address the Node Registry's HTTP surface binds to.
    #[serde(default = "default_registry_http_addr")]
    pub registry_http_addr: SocketAddr,
    /// Address the telemetry server (`/metrics`, `/healthz`, `/readyz`) binds to.
    #[serde(default = "default_telemetry_http_addr")]
    pub telemetry_http_addr: SocketAddr,
}

/// Node Registry section of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Maximum total registered Nodes.
    pub cap: u64,
    /// Minimum on-chain balance, in grains, to register or remain registered.
    pub min_balance: i64,
    /// Minimum accepted `x-node-version` for new registrations.
    pub min_new_version: String,
    /// Minimum accepted `x-node-version` for updates to existing Nodes.
    pub min_existing_version: String,
    /// Base URL of the external token service's `GET /balance/:addr` endpoint.
    pub token_service_base_url: String,
}

/// Audit Engine section of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Minimum `tntCredit` a Node must hold to pass an audit.
    pub min_credits: i64,
    /// Minimum accepted Node software version.
    pub min_version: String,
    /// Minimum on-chain balance, in grains, required to pass an audit.
    pub min_balance: i64,
    /// Seconds between challenge refreshes (default: one hour).
    pub challenge_period_secs: u64,
    /// Seconds between audit rounds (default: one hour, offset).
    pub round_period_secs: u64,
}

/// Reward Engine section of the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct RewardConfig {
    /// Base URL of the external token service's `POST /transfer` endpoint.
    pub token_service_base_url: String,
}

fn default_registry_http_addr() -> SocketAddr {
    ([0, 0, 0, 0], 8080).into()
}

fn default_telemetry_http_addr() -> SocketAddr {
    ([0, 0, 0, 0], 9090).into()
}

impl NodeConfig {
    /// Loads the TOML file at `path`, then applies any of the
    /// `CHRONICLE_AMQP_URL` / `CHRONICLE_REDIS_URL` /
    /// `CHRONICLE_SIGNING_KEY_SEED` environment overrides that are set.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: NodeConfig = toml::from_str(&raw)?;
        if let Ok(url) = std::env::var("CHRONICLE_AMQP_URL") {
            config.amqp_url = url;
        }
        if let Ok(url) = std::env::var("CHRONICLE_REDIS_URL") {
            config.redis_url = url;
        }
        if let Ok(seed) = std::env::var("CHRONICLE_SIGNING_KEY_SEED") {
            config.signing_key_seed_b64 = seed;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
stack_id = "stack1"
data_dir = "/var/lib/chronicle"
amqp_url = "amqp://localhost:5672"
redis_url = "redis://localhost:6379"
anchor_uri_base = "https://calendar.example.org"
signing_key_seed_b64 = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="
credit_top_off_floor = 100

[registry]
cap = 1000
min_balance = 1000
min_new_version = "1.0.0"
min_existing_version = "1.0.0"
token_service_base_url = "https://token.example.org"

[audit]
min_credits = 10
min_version = "1.0.0"
min_balance = 1000
challenge_period_secs = 3600
round_period_secs = 3600

[reward]
token_service_base_url = "https://token.example.org"
"#;

    #[test]
    fn parses_a_well_formed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chronicle.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.stack_id, "stack1");
        assert_eq!(config.registry.cap, 1000);
        assert_eq!(config.registry_http_addr.port(), 8080);
    }

    #[test]
    fn env_vars_override_the_amqp_and_redis_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chronicle.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        std::env::set_var("CHRONICLE_AMQP_URL", "amqp://override:5672");
        let config = NodeConfig::load(&path).unwrap();
        std::env::remove_var("CHRONICLE_AMQP_URL");
        assert_eq!(config.amqp_url, "amqp://override:5672");
    }
}
