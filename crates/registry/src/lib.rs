//! Node Registry: registration, updates, and the
//! `randomHealthy`/`blacklist` sampling endpoints external collaborators
//! poll.

pub mod error;
pub mod http;
pub mod service;
pub mod store;
pub mod validate;

pub use error::RegistryError;
pub use service::{version_lt, BalanceOracle, HttpBalanceOracle, RegistryConfig, RegistryService};
pub use store::NodeStore;
