//! The Calendar Writer: the single-writer service that turns a
//! tick's worth of aggregator submissions into one signed `cal` block.

pub mod engine;
pub mod error;
pub mod retry;

pub use engine::{CalendarEngine, PendingSubmission, TICK_INTERVAL};
pub use error::CalendarError;
