//! Delivery backends.
//!
//! A delivery backend takes accepted messages and spools them durably. The
//! `local` backend writes each message to `<spool>/tmp` and renames it into
//! `<spool>/new` once complete; [`DeliveryService::deliveries`] then yields
//! every published message exactly once.

pub mod error;
pub mod local;
pub mod message;
pub mod staging;
pub mod types;
mod watch;

use std::fmt::Debug;

use async_trait::async_trait;
use burrow_auth::Identity;
use burrow_common::Signal;
use tokio::sync::broadcast;

pub use error::{DeliveryError, ParseError};
pub use local::{LocalDelivery, LocalDeliveryOptions};
pub use message::{Delivered, Envelope, SpooledMessage};
pub use staging::{Maildir, StagedFile};
pub use types::SpooledMessageId;
pub use watch::Deliveries;

#[async_trait]
pub trait DeliveryService: Send + Sync + Debug {
    /// Durably spool `message`, returning its id.
    ///
    /// Once this returns `Ok` the message survives a crash and will be
    /// yielded by [`DeliveryService::deliveries`].
    async fn deliver(&self, message: &SpooledMessage) -> Result<SpooledMessageId, DeliveryError>;

    /// Whether this backend will accept mail from `from` to `to`.
    fn will_deliver(&self, from: &str, to: &str, identity: Option<&dyn Identity>) -> bool {
        let _ = (from, to, identity);
        true
    }

    /// Stream of messages published to the spool, ending on
    /// [`Signal::Shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Watch`] if the spool cannot be watched.
    fn deliveries(
        &self,
        shutdown: broadcast::Receiver<Signal>,
    ) -> Result<Deliveries, DeliveryError>;
}
