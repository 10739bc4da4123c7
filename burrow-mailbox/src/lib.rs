//! Mailbox storage.
//!
//! [`MailboxService::open`] is the only way to obtain a [`Mailbox`], and only
//! succeeds for addresses that resolve to an existing local mailbox.

pub mod error;
pub mod local;
pub mod pattern;

use std::{fmt::Debug, path::PathBuf};

use async_trait::async_trait;
use burrow_common::Address;
use burrow_spool::Delivered;

pub use error::MailboxError;
pub use local::{LocalMailbox, LocalMailboxOptions, UserMailbox};
pub use pattern::MaildirPattern;

pub trait MailboxService: Send + Sync + Debug {
    /// Open the mailbox for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::NotFound`] unless the address resolves to a
    /// primary local domain with an existing mailbox.
    fn open(&self, address: &str) -> Result<Box<dyn Mailbox>, MailboxError>;
}

#[async_trait]
pub trait Mailbox: Send + Sync + Debug {
    fn address(&self) -> &Address;

    /// Persist one message, returning the path it was published at.
    ///
    /// Storing the same message again leaves a single copy.
    async fn store(&self, message: &Delivered) -> Result<PathBuf, MailboxError>;
}
