//! Core data structures and error types for the Chronicle calendar engine.
//!
//! This crate has minimal dependencies to remain stable: every other crate
//! in the workspace depends on it, but it depends on none of them.

pub mod audit;
pub mod block;
pub mod error;
pub mod message;
pub mod node;
pub mod proof;

pub use audit::AuditChallenge;
pub use block::{Block, BlockType, BLOCK_VERSION};
pub use error::{
    BusError, CoordinationError, CoreError, ErrorCode, RegistryError, RewardError,
};
pub use message::{
    AggregatorMsg, AuditNodeTask, BtcMonMsg, BtcMonRequest, BtcTxMsg, BtcTxRequest, InboundMessage,
    PruneMsg, RewardMsg, RewardTarget, StateMessage,
};
pub use node::{AuditLogRow, RegisteredNode};
pub use proof::{HashOp, ProofOp, ProofSegment};
