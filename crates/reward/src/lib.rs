//! The Reward Engine: pays out Node (and optional core)
//! token rewards and records the resulting transfers as a `reward` block.

pub mod engine;
pub mod error;
pub mod transfer;

pub use engine::RewardEngine;
pub use error::RewardError;
pub use transfer::{HttpTokenTransferClient, TokenTransferClient};
