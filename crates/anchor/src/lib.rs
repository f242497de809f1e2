//! The Anchor Engine: Bitcoin anchoring, confirmation, and
//! transaction pre-processing for the Chronicle calendar engine.

pub mod engine;
pub mod error;
pub mod schedule;

pub use engine::{preprocess_btctx, AnchorEngine};
pub use error::AnchorError;
