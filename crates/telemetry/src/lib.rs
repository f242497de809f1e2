//! Observability, metrics, and structured logging for the Chronicle
//! calendar engine.

pub mod http;
pub mod init;
pub mod metrics;

pub use init::init_tracing;
