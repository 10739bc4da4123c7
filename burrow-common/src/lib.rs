pub mod address;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use address::Address;
pub use config::{AppConfig, BackendConfig, IdentityPolicySet};
pub use domain::Domain;
pub use error::{AddressError, ConfigError};
pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
