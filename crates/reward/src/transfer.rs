//! The external token transfer service: a single `POST
//! /transfer` call per leg, never retried — a retry could double-pay, and
//! the caller already tolerates a failed leg by omitting it from the
//! reward block.

use async_trait::async_trait;
use chronicle_types::RewardError;
use std::time::Duration;

/// Moves `value` grains to `to_addr` and returns the resulting transaction
/// id. Abstracted behind a trait so tests can substitute a fixed id
/// instead of dialing the token service.
#[async_trait]
pub trait TokenTransferClient: Send + Sync {
    async fn transfer(&self, to_addr: &str, value: u64) -> Result<String, RewardError>;
}

/// `POST {base_url}/transfer` against the external token service.
pub struct HttpTokenTransferClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTokenTransferClient {
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

#[derive(serde::Serialize)]
struct TransferRequest<'a> {
    to_addr: &'a str,
    value: u64,
}

#[derive(serde::Deserialize)]
struct TransferResponse {
    trx_id: String,
}

#[async_trait]
impl TokenTransferClient for HttpTokenTransferClient {
    async fn transfer(&self, to_addr: &str, value: u64) -> Result<String, RewardError> {
        let url = format!("{}/transfer", self.base_url);
        let resp = self
        .client
        .post(&url)
        .json(&TransferRequest { to_addr, value })
        .send()
        .await
        .map_err(|e| RewardError::TransferFailed(e.to_string()))?
        .error_for_status()
        .map_err(|e| RewardError::TransferFailed(e.to_string()))?
        .json::<TransferResponse>()
        .await
        .map_err(|e| RewardError::TransferFailed(format!("malformed transfer response: {e}")))?;
        Ok(resp.trx_id)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Always succeeds, handing back a deterministic, incrementing tx id.
    pub struct FixedTransferClient {
        counter: AtomicU64,
    }

    impl FixedTransferClient {
        pub fn new() -> Self {
            Self {
                counter: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl TokenTransferClient for FixedTransferClient {
        async fn transfer(&self, _to_addr: &str, _value: u64) -> Result<String, RewardError> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("tx{n}"))
        }
    }

    /// Always fails, for exercising the "ack anyway" path.
    pub struct FailingTransferClient;

    #[async_trait]
    impl TokenTransferClient for FailingTransferClient {
        async fn transfer(&self, _to_addr: &str, _value: u64) -> Result<String, RewardError> {
            Err(RewardError::TransferFailed("token service unreachable".into()))
        }
    }
}
