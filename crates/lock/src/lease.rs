//! A single TTL-leased lock held against the coordination backend:
//! `SET key token NX PX ttl` to acquire, a compare-and-delete Lua script to
//! release, and a compare-and-pexpire script to renew — the usual
//! single-instance Redlock primitives, scoped to one backend node rather
//! than a multi-master quorum.

use crate::backoff::delay;
use crate::error::LockError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default lease duration for Calendar/Leader locks.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15);

/// Events a held lease's background renewal loop reports, mirroring the
/// `release`/`error`/`end` notifications distributed lock clients
/// conventionally expose.
#[derive(Debug, Clone)]
pub enum LockEvent {
    /// The lease was renewed for another TTL window.
    Renewed,
    /// The lease was released, by caller request or lost ownership.
    Released,
    /// A renewal attempt failed; the lease may expire unless this recovers.
    Error(String),
    /// The renewal loop has exited and will not run again.
    End,
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
 return redis.call("del", KEYS[1])
else
 return 0
end
"#;

const RENEW_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
 return redis.call("pexpire", KEYS[1], ARGV[2])
else
 return 0
end
"#;

/// A connected handle to the coordination backend, used to acquire leases
/// against named resources (`cal-lock:<stackId>`, `leader:<role>`,...).
#[derive(Clone)]
pub struct LockClient {
    conn: ConnectionManager,
}

impl LockClient {
    /// Connects to the backend at `redis_url` (e.g. `redis://localhost:6379`).
    pub async fn connect(redis_url: &str) -> Result<Self, LockError> {
        let client = redis::Client::open(redis_url)
        .map_err(|e| LockError::Unavailable(e.to_string()))?;
        let conn = client
        .get_tokio_connection_manager()
        .await
        .map_err(|e| LockError::Unavailable(e.to_string()))?;
        Ok(Self { conn })
    }

    /// A single, non-blocking attempt to acquire `resource`. Returns
    /// `Ok(None)` if some other holder currently owns it.
    pub async fn try_acquire(
        &self,
        resource: &str,
        ttl: Duration,
    ) -> Result<Option<Lease>, LockError> {
        let token = uuid::Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();
        let acquired: bool = redis::cmd("SET")
        .arg(resource)
        .arg(&token)
        .arg("NX")
        .arg("PX")
        .arg(ttl.as_millis() as u64)
        .query_async::<_, Option<String>>(&mut conn)
        .await
        .map_err(|e| LockError::Unavailable(e.to_string()))?
        .is_some();
        if !acquired {
            return Ok(None);
        }
        Ok(Some(Lease::new(self.clone(), resource.to_string(), token, ttl)))
    }

    /// Retries [`Self::try_acquire`] with bounded exponential backoff until
    /// the lock is won. Used by the Calendar writer and leader elector,
    /// which both wait their turn rather than fail fast on contention.
    pub async fn acquire_with_retry(
        &self,
        resource: &str,
        ttl: Duration,
    ) -> Result<Lease, LockError> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            if let Some(lease) = self.try_acquire(resource, ttl).await? {
                chronicle_telemetry::metrics::observe_lock_acquire_wait(
                    started.elapsed().as_secs_f64(),
                );
                return Ok(lease);
            }
            tokio::time::sleep(delay(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    }

    async fn release(&self, resource: &str, token: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let released: i32 = redis::Script::new(RELEASE_SCRIPT)
        .key(resource)
        .arg(token)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| LockError::Unavailable(e.to_string()))?;
        Ok(released == 1)
    }

    async fn renew(&self, resource: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let renewed: i32 = redis::Script::new(RENEW_SCRIPT)
        .key(resource)
        .arg(token)
        .arg(ttl.as_millis() as u64)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| LockError::Unavailable(e.to_string()))?;
        Ok(renewed == 1)
    }

    /// Reads the current holder's token for `resource`, if any. Always a
    /// fresh round-trip to the backend — never cached — since leadership
    /// must be re-checked every tick rather than assumed from the last
    /// successful renewal.
    pub async fn current_holder(&self, resource: &str) -> Result<Option<String>, LockError> {
        let mut conn = self.conn.clone();
        conn.get(resource)
        .await
        .map_err(|e| LockError::Unavailable(e.to_string()))
    }
}

/// A held lease, auto-renewed on a background task until released or lost.
pub struct Lease {
    client: LockClient,
    resource: String,
    token: String,
    renew_task: Option<JoinHandle<()>>,
    events: mpsc::UnboundedReceiver<LockEvent>,
}

impl Lease {
    fn new(client: LockClient, resource: String, token: String, ttl: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let renew_client = client.clone();
        let renew_resource = resource.clone();
        let renew_token = token.clone();
        let renew_task = tokio::spawn(async move {
                let interval = ttl / 3;
                loop {
                    tokio::time::sleep(interval).await;
                    match renew_client.renew(&renew_resource, &renew_token, ttl).await {
                        Ok(true) => {
                            if tx.send(LockEvent::Renewed).is_err() {
                                break;
                            }
                        }
                        Ok(false) => {
                            let _ = tx.send(LockEvent::Released);
                            break;
                        }
                        Err(e) => {
                            if tx.send(LockEvent::Error(e.to_string())).is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = tx.send(LockEvent::End);
        });
        Self {
            client,
            resource,
            token,
            renew_task: Some(renew_task),
            events: rx,
        }
    }

    /// The resource name this lease holds.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The opaque ownership token this lease was granted. Used by the
    /// leader elector to verify fresh leadership without trusting the
    /// lease's own (potentially stale) renewal state.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Receives the next renewal event for this lease, if the background
    /// task is still running.
    pub async fn next_event(&mut self) -> Option<LockEvent> {
        self.events.recv().await
    }

    /// Releases the lease, stopping background renewal. Idempotent.
    pub async fn release(mut self) -> Result<(), LockError> {
        if let Some(task) = self.renew_task.take() {
            task.abort();
        }
        self.client.release(&self.resource, &self.token).await?;
        Ok(())
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(task) = self.renew_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_matches_calendar_lock_window() {
        assert_eq!(DEFAULT_TTL, Duration::from_secs(15));
    }
}
