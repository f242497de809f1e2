//! Wires every engine together into one running process: the per-tick
//! Calendar writer, the wall-clock-scheduled Anchor engine, the
//! leader-gated Audit engine, the per-task Audit/Reward workers, the Node
//! Registry's HTTP surface, and the daily credit top-off — all sharing one
//! block store, one bus connection, and one signing identity.

use crate::config::NodeConfig;
use chronicle_anchor::AnchorEngine;
use chronicle_audit::{AuditCadence, AuditEngine, AuditThresholds, AuditWorker, ChallengeCache, HttpNodeProbe, NodeProbe};
use chronicle_bus::{ack, nack, queues, BusAdapter, RECONNECT_BACKOFF};
use chronicle_calendar::{CalendarEngine, PendingSubmission};
use chronicle_crypto::Signer;
use chronicle_lock::{LeaderElector, LockClient, DEFAULT_TTL};
use chronicle_registry::{BalanceOracle, HttpBalanceOracle, NodeStore, RegistryConfig, RegistryService};
use chronicle_reward::{HttpTokenTransferClient, RewardEngine, TokenTransferClient};
use chronicle_storage::BlockStore;
use chronicle_types::{AuditNodeTask, InboundMessage};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Builds every engine from `config` and runs the process until a
/// shutdown signal arrives, then stops all background tasks.
pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
    chronicle_telemetry::metrics::install()?;
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(BlockStore::open(config.data_dir.join("blocks.redb"))?);
    let node_store = Arc::new(NodeStore::open(config.data_dir.join("registry.redb"))?);
    let audit_log_store = Arc::new(chronicle_audit::AuditLogStore::open(
            config.data_dir.join("audit_log.redb"),
        )?);
    let signer = Arc::new(Signer::from_base64_seed(&config.signing_key_seed_b64)?);
    let bus = Arc::new(BusAdapter::connect_with_retry(&config.amqp_url).await);
    let lock_client = LockClient::connect(&config.redis_url).await?;
    let elector = LeaderElector::new(lock_client.clone());

    let calendar = Arc::new(CalendarEngine::new(
            config.stack_id.clone(),
            Arc::clone(&store),
            lock_client.clone(),
            Arc::clone(&bus),
            Arc::clone(&signer),
            config.anchor_uri_base.clone(),
    ));
    let anchor = Arc::new(AnchorEngine::new(
            config.stack_id.clone(),
            Arc::clone(&store),
            lock_client.clone(),
            Arc::clone(&bus),
            Arc::clone(&signer),
            config.anchor_uri_base.clone(),
    ));

    let balances: Arc<dyn BalanceOracle> = Arc::new(HttpBalanceOracle::new(
            config.registry.token_service_base_url.clone(),
    ));
    let registry_service = Arc::new(RegistryService::new(
            Arc::clone(&node_store),
            Arc::clone(&balances),
            RegistryConfig {
                cap: config.registry.cap,
                min_balance: config.registry.min_balance,
                min_new_version: config.registry.min_new_version.clone(),
                min_existing_version: config.registry.min_existing_version.clone(),
            },
    ));

    let challenges = Arc::new(ChallengeCache::new());
    let audit_engine = Arc::new(AuditEngine::new(
            Arc::clone(&store),
            Arc::clone(&node_store),
            Arc::clone(&bus),
            elector,
            Arc::clone(&challenges),
            AuditCadence {
                challenge_period: Duration::from_secs(config.audit.challenge_period_secs),
                round_period: Duration::from_secs(config.audit.round_period_secs),
            },
    ));
    let probe: Arc<dyn NodeProbe> = Arc::new(HttpNodeProbe::new());
    let audit_worker = Arc::new(AuditWorker::new(
            Arc::clone(&node_store),
            Arc::clone(&audit_log_store),
            Arc::clone(&challenges),
            probe,
            Arc::clone(&balances),
            AuditThresholds {
                min_credits: config.audit.min_credits,
                min_version: config.audit.min_version.clone(),
                min_balance: config.audit.min_balance,
            },
    ));

    let transfers: Arc<dyn TokenTransferClient> = Arc::new(HttpTokenTransferClient::new(
            config.reward.token_service_base_url.clone(),
    ));
    let reward = Arc::new(RewardEngine::new(
            config.stack_id.clone(),
            Arc::clone(&store),
            Arc::clone(&signer),
            transfers,
    ));

    let (calendar_tx, calendar_rx) = mpsc::channel(256);

    let mut tasks = Vec::new();
    tasks.push(tokio::spawn({
                let calendar = Arc::clone(&calendar);
                async move { calendar.run(calendar_rx).await }
    }));
    tasks.push(tokio::spawn({
                let anchor = Arc::clone(&anchor);
                async move { anchor.run().await }
    }));
    tasks.push(tokio::spawn({
                let audit_engine = Arc::clone(&audit_engine);
                async move { audit_engine.run().await }
    }));
    tasks.push(tokio::spawn(run_work_in_cal_consumer(
                Arc::clone(&bus),
                calendar_tx,
                Arc::clone(&anchor),
                Arc::clone(&reward),
    )));
    tasks.push(tokio::spawn(run_task_handler_consumer(
                Arc::clone(&bus),
                Arc::clone(&audit_log_store),
    )));
    tasks.push(tokio::spawn(run_audit_task_consumer(
                Arc::clone(&bus),
                Arc::clone(&audit_worker),
    )));
    tasks.push(tokio::spawn(run_credit_top_off(
                Arc::clone(&registry_service),
                lock_client.clone(),
                config.credit_top_off_floor,
    )));

    let registry_http = tokio::spawn(serve_registry_http(
            Arc::clone(&registry_service),
            config.registry_http_addr,
    ));
    let telemetry_http = tokio::spawn(chronicle_telemetry::http::run_server(
            config.telemetry_http_addr,
    ));

    wait_for_shutdown().await;
    tracing::info!("shutting down");
    for task in tasks {
        task.abort();
    }
    registry_http.abort();
    telemetry_http.abort();
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn serve_registry_http(service: Arc<RegistryService>, addr: SocketAddr) {
    let app = chronicle_registry::http::router(service);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind registry http server");
            return;
        }
    };
    tracing::info!(addr = %addr, "registry http server listening");
    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!(error = %e, "registry http server error");
    }
}

/// Runs the daily `tntCredit` top-off, gated by a one-shot (not
/// auto-renewed) lease over the `reward` resource — unlike the Calendar
/// and Audit leader roles, this task only needs to win the race once a
/// day, not hold leadership continuously.
async fn run_credit_top_off(registry: Arc<RegistryService>, lock: LockClient, floor: i64) {
    const PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
    loop {
        tokio::time::sleep(PERIOD).await;
        match lock.try_acquire("reward", DEFAULT_TTL).await {
            Ok(Some(lease)) => {
                match registry.top_off_credits(floor) {
                    Ok(n) => tracing::info!(topped_off = n, "daily credit top-off completed"),
                    Err(e) => tracing::error!(error = %e, "credit top-off failed"),
                }
                let _ = lease.release().await;
            }
            Ok(None) => tracing::debug!("another process holds the reward lock, skipping top-off"),
            Err(e) => tracing::error!(error = %e, "failed to acquire the reward lock for top-off"),
        }
    }
}

/// Consumes `work.in.cal`, the queue multiplexing aggregator submissions,
/// Bitcoin tx pre-processing requests, Bitcoin confirmations, and reward
/// instructions under one `type`-tagged envelope.
async fn run_work_in_cal_consumer(
    bus: Arc<BusAdapter>,
    calendar_tx: mpsc::Sender<PendingSubmission>,
    anchor: Arc<AnchorEngine>,
    reward: Arc<RewardEngine>,
) {
    loop {
        let mut consumer = match bus.consume(queues::WORK_IN_CAL, "node-work-in-cal", 16).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to start work.in.cal consumer");
                tokio::time::sleep(RECONNECT_BACKOFF).await;
                continue;
            }
        };
        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, "work.in.cal consumer error, reconnecting");
                    break;
                }
            };
            let msg: InboundMessage = match serde_json::from_slice(&delivery.data) {
                Ok(m) => m,
                Err(e) => {
                    tracing::error!(error = %e, "undecodable work.in.cal message, discarding");
                    let _ = nack(&delivery, false).await;
                    continue;
                }
            };
            tokio::spawn(handle_work_in_cal(
                    msg,
                    delivery,
                    calendar_tx.clone(),
                    Arc::clone(&anchor),
                    Arc::clone(&reward),
                    Arc::clone(&bus),
            ));
        }
    }
}

async fn handle_work_in_cal(
    msg: InboundMessage,
    delivery: lapin::message::Delivery,
    calendar_tx: mpsc::Sender<PendingSubmission>,
    anchor: Arc<AnchorEngine>,
    reward: Arc<RewardEngine>,
    bus: Arc<BusAdapter>,
) {
    match msg {
        InboundMessage::Aggregator(agg) => {
            let (resolution, rx) = oneshot::channel();
            if calendar_tx
            .send(PendingSubmission { msg: agg, resolution })
            .await
            .is_err()
            {
                tracing::error!("calendar engine inbox closed, requeuing submission");
                let _ = nack(&delivery, true).await;
                return;
            }
            match rx.await {
                Ok(true) => {
                    let _ = ack(&delivery).await;
                }
                _ => {
                    let _ = nack(&delivery, true).await;
                }
            }
        }
        InboundMessage::Btctx(tx_msg) => match chronicle_anchor::preprocess_btctx(&tx_msg) {
            Ok(state) => match bus.publish_json(queues::WORK_OUT_STATE, &state).await {
                Ok(()) => {
                    let _ = ack(&delivery).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to publish btctx proof state");
                    let _ = nack(&delivery, true).await;
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "btctx pre-processing failed");
                let _ = nack(&delivery, false).await;
            }
        },
        InboundMessage::Btcmon(mon_msg) => match anchor.handle_confirm(&mon_msg).await {
            Ok(id) => {
                tracing::info!(block_id = id, "btc confirmation recorded");
                let _ = ack(&delivery).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "btc confirmation handling failed");
                let _ = nack(&delivery, true).await;
            }
        },
        InboundMessage::Reward(reward_msg) => {
            if let Err(e) = reward.process(&reward_msg).await {
                tracing::error!(error = %e, "reward processing failed");
            }
            // Ack regardless of outcome: redelivering a reward instruction
            // risks paying a node twice.
            let _ = ack(&delivery).await;
        }
        InboundMessage::Prune(_) => {
            tracing::debug!("prune message received on work.in.cal; pruning runs off task-handler-queue");
            let _ = ack(&delivery).await;
        }
    }
}

/// Consumes `task-handler-queue`, the generic fan-out queue carrying
/// scheduled pruning batches.
async fn run_task_handler_consumer(bus: Arc<BusAdapter>, audit_log: Arc<chronicle_audit::AuditLogStore>) {
    loop {
        let mut consumer = match bus
        .consume(queues::TASK_HANDLER_QUEUE, "node-task-handler", 4)
        .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to start task-handler consumer");
                tokio::time::sleep(RECONNECT_BACKOFF).await;
                continue;
            }
        };
        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, "task-handler consumer error, reconnecting");
                    break;
                }
            };
            match serde_json::from_slice::<InboundMessage>(&delivery.data) {
                Ok(InboundMessage::Prune(p)) => match audit_log.prune_older_than(p.older_than_ms, p.batch_size) {
                    Ok(n) => {
                        tracing::info!(deleted = n, "audit log pruned");
                        let _ = ack(&delivery).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "audit log prune failed");
                        let _ = nack(&delivery, true).await;
                    }
                },
                Ok(_) => {
                    tracing::warn!("unexpected message type on task-handler-queue, discarding");
                    let _ = ack(&delivery).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "undecodable task-handler message, discarding");
                    let _ = nack(&delivery, false).await;
                }
            }
        }
    }
}

/// Consumes `work.out.audit`, running each `audit_node` task against the
/// Audit Worker. Not leader-gated: any process may pick up any task.
async fn run_audit_task_consumer(bus: Arc<BusAdapter>, worker: Arc<AuditWorker>) {
    loop {
        let mut consumer = match bus.consume(queues::WORK_OUT_AUDIT, "node-audit-worker", 8).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to start work.out.audit consumer");
                tokio::time::sleep(RECONNECT_BACKOFF).await;
                continue;
            }
        };
        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, "work.out.audit consumer error, reconnecting");
                    break;
                }
            };
            match serde_json::from_slice::<AuditNodeTask>(&delivery.data) {
                Ok(task) => {
                    let worker = Arc::clone(&worker);
                    tokio::spawn(async move {
                            match worker.handle_task(&task).await {
                                Ok(row) => {
                                    tracing::info!(node = %row.tnt_addr, passed = row.passed, "audit task completed");
                                    let _ = ack(&delivery).await;
                                }
                                Err(e) => {
                                    tracing::error!(error = %e, "audit task failed");
                                    let _ = nack(&delivery, true).await;
                                }
                            }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "undecodable audit task, discarding");
                    let _ = nack(&delivery, false).await;
                }
            }
        }
    }
}
