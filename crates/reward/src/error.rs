//! The Reward Engine shares its error taxonomy with the rest of the
//! workspace; no transfer- or block-append failure here is specific to
//! this crate.

pub use chronicle_types::{ErrorCode, RewardError};
