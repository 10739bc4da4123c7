//! Mail backends: address resolution, authentication, spool delivery and
//! maildir storage, wired together from a TOML configuration.

pub mod admission;
pub mod backends;
pub mod config;
pub mod controller;
pub mod registry;
pub mod router;

pub use admission::{AcceptError, Admission, Rejection};
pub use backends::Backends;
pub use config::Config;
pub use controller::Burrow;
pub use registry::{Constructor, Deps, Registries, Registry};
pub use router::{Routed, Router};

pub use burrow_auth as auth;
pub use burrow_common as common;
pub use burrow_mailbox as mailbox;
pub use burrow_resolver as resolver;
pub use burrow_spool as spool;
