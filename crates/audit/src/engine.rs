//! The Audit Engine's leader-gated periodic loops: challenge
//! generation and audit-round scheduling both run under a single
//! `audit-producer` leadership role, since only one process may refresh the
//! shared challenge or fan out `audit_node` tasks at a time.

use crate::challenge::{self, ChallengeCache};
use crate::error::AuditError;
use crate::round::{self, RoundSummary};
use crate::schedule::{duration_until_next_tick, half_period_offset};
use chronicle_bus::BusAdapter;
use chronicle_lock::{LeaderElector, Lease};
use chronicle_registry::NodeStore;
use chronicle_storage::BlockStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const ROLE: &str = "audit-producer";

/// Cadence configuration for the two periodic activities.
pub struct AuditCadence {
    /// Period between challenge refreshes (default: hourly).
    pub challenge_period: Duration,
    /// Period between audit rounds; a round ticks at a half-period offset
    /// from challenge generation so the two never compete for a tick.
    pub round_period: Duration,
}

/// Drives the leader-gated challenge generation and audit round loops for
/// one Calendar stack.
pub struct AuditEngine {
    store: Arc<BlockStore>,
    node_store: Arc<NodeStore>,
    bus: Arc<BusAdapter>,
    elector: LeaderElector,
    challenges: Arc<ChallengeCache>,
    cadence: AuditCadence,
}

impl AuditEngine {
    pub fn new(
        store: Arc<BlockStore>,
        node_store: Arc<NodeStore>,
        bus: Arc<BusAdapter>,
        elector: LeaderElector,
        challenges: Arc<ChallengeCache>,
        cadence: AuditCadence,
    ) -> Self {
        Self {
            store,
            node_store,
            bus,
            elector,
            challenges,
            cadence,
        }
    }

    /// Campaigns for the `audit-producer` role, then runs the challenge
    /// generation and audit round loops concurrently for as long as this
    /// process holds leadership. Never returns in ordinary operation.
    pub async fn run(&self) {
        let lease = match self.elector.campaign(ROLE).await {
            Ok(lease) => Arc::new(lease),
            Err(e) => {
                tracing::error!(error = %e, "failed to campaign for audit-producer leadership");
                return;
            }
        };
        tokio::join!(
            self.run_challenge_loop(Arc::clone(&lease)),
            self.run_round_loop(Arc::clone(&lease)),
        );
    }

    async fn run_challenge_loop(&self, lease: Arc<Lease>) {
        loop {
            tokio::time::sleep(duration_until_next_tick(
                    SystemTime::now(),
                    self.cadence.challenge_period,
                    Duration::ZERO,
            ))
            .await;
            match self.elector.is_leader(ROLE, &lease).await {
                Ok(true) => match self.generate_challenge().await {
                    Ok(()) => tracing::info!("audit challenge refreshed"),
                    Err(e) => tracing::error!(error = %e, "challenge generation failed"),
                },
                Ok(false) => {
                    tracing::debug!("lost audit-producer leadership, skipping challenge tick")
                }
                Err(e) => tracing::error!(error = %e, "leadership check failed"),
            }
        }
    }

    async fn run_round_loop(&self, lease: Arc<Lease>) {
        let phase = half_period_offset(self.cadence.round_period);
        loop {
            tokio::time::sleep(duration_until_next_tick(
                    SystemTime::now(),
                    self.cadence.round_period,
                    phase,
            ))
            .await;
            match self.elector.is_leader(ROLE, &lease).await {
                Ok(true) => match self.run_round().await {
                    Ok(summary) => tracing::info!(
                        tasks = summary.tasks_enqueued,
                        decayed = summary.decayed,
                        active = summary.active_node_count,
                        "audit round completed"
                    ),
                    Err(e) => tracing::error!(error = %e, "audit round failed"),
                },
                Ok(false) => tracing::debug!("lost audit-producer leadership, skipping round tick"),
                Err(e) => tracing::error!(error = %e, "leadership check failed"),
            }
        }
    }

    /// Generates a fresh challenge and publishes it into the shared cache.
    pub async fn generate_challenge(&self) -> Result<(), AuditError> {
        let fresh = challenge::generate(&self.store)?;
        self.challenges.set(fresh);
        Ok(())
    }

    /// Runs one audit round directly, bypassing the leader-gated loop.
    /// Exposed for tests and for an operator-triggered manual round.
    pub async fn run_round(&self) -> Result<RoundSummary, AuditError> {
        round::run_round(&self.node_store, &self.bus).await
    }
}
