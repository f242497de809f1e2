//! Audit Engine: time-bound Merkle challenges, leader-gated
//! round scheduling, and per-task Node result consumption.

pub mod challenge;
pub mod engine;
pub mod error;
pub mod log;
pub mod round;
pub mod schedule;
pub mod worker;

pub use challenge::ChallengeCache;
pub use engine::{AuditCadence, AuditEngine};
pub use error::AuditError;
pub use log::AuditLogStore;
pub use worker::{AuditThresholds, AuditWorker, HttpNodeProbe, NodeAuditResponse, NodeProbe};
