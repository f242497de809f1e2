//! The Leader Elector: exactly one process holds leadership for
//! a given role (`calendar`, `audit-producer`) at a time, implemented as a
//! long-held lease over `leader:<role>` renewed in the background.

use crate::error::LockError;
use crate::lease::{Lease, LockClient, DEFAULT_TTL};

/// Wraps a [`LockClient`] to give named roles (`calendar`, `audit-producer`)
/// a dedicated, slightly friendlier API than raw resource-name locking.
#[derive(Clone)]
pub struct LeaderElector {
    client: LockClient,
}

impl LeaderElector {
    /// Builds an elector over an already-connected lock backend.
    pub fn new(client: LockClient) -> Self {
        Self { client }
    }

    fn resource(role: &str) -> String {
        format!("leader:{role}")
    }

    /// Blocks (retrying with bounded backoff) until this process becomes
    /// leader for `role`, then returns the held, auto-renewing lease.
    pub async fn campaign(&self, role: &str) -> Result<Lease, LockError> {
        self.client
        .acquire_with_retry(&Self::resource(role), DEFAULT_TTL)
        .await
    }

    /// Whether `lease` is still the current leader for `role`, checked with
    /// a fresh read against the backend rather than the lease's cached
    /// renewal state — a lease can be silently lost (missed renewal, network
    /// partition) between ticks, and every tick must re-verify before
    /// acting on leader-only state.
    pub async fn is_leader(&self, role: &str, lease: &Lease) -> Result<bool, LockError> {
        let holder = self.client.current_holder(&Self::resource(role)).await?;
        Ok(holder.as_deref() == Some(lease.token()))
    }
}
