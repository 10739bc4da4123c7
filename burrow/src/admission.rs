//! Checks applied to a message before it is handed to the delivery backend.

use burrow_auth::Identity;
use burrow_common::IdentityPolicySet;
use burrow_resolver::{Disposition, RejectReason, Resolver};
use burrow_spool::{DeliveryError, DeliveryService, Envelope};
use thiserror::Error;

/// Why a message was not accepted.
#[derive(Debug, Error)]
pub enum AcceptError {
    /// A recipient, or the recipient list as a whole, was refused.
    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),

    /// The authenticated identity may not use this sender address.
    #[error("{identity} may not send as <{from}>")]
    InvalidSender { from: String, identity: String },

    /// The delivery backend will not take mail from `from` to `to`.
    #[error("Delivery not permitted from <{from}> to <{to}>")]
    NotPermitted { from: String, to: String },

    /// The delivery backend failed to spool the message.
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl AcceptError {
    /// Basic SMTP reply code for this failure
    #[must_use]
    pub const fn reply_code(&self) -> u16 {
        match self {
            Self::Rejected(rejection) => rejection.reply_code(),
            Self::InvalidSender { .. } | Self::NotPermitted { .. } => 553,
            Self::Delivery(_) => 451,
        }
    }

    /// Checks if the reply is a permanent rejection
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        self.reply_code() >= 500
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("<{recipient}>: {reason}")]
    Recipient {
        recipient: String,
        reason: RejectReason,
    },

    #[error("{count} recipients exceeds the maximum of {maximum}")]
    TooManyRecipients { count: usize, maximum: usize },

    #[error("no recipients")]
    NoRecipients,
}

impl Rejection {
    #[must_use]
    pub const fn reply_code(&self) -> u16 {
        match self {
            Self::Recipient { .. } => 550,
            Self::TooManyRecipients { .. } => 452,
            Self::NoRecipients => 554,
        }
    }
}

/// Admission checks for one message.
#[derive(Debug, Clone, Copy)]
pub struct Admission<'a> {
    resolver: &'a dyn Resolver,
    delivery: &'a dyn DeliveryService,
    identity: Option<&'a dyn Identity>,
}

impl<'a> Admission<'a> {
    #[must_use]
    pub const fn new(
        resolver: &'a dyn Resolver,
        delivery: &'a dyn DeliveryService,
        identity: Option<&'a dyn Identity>,
    ) -> Self {
        Self {
            resolver,
            delivery,
            identity,
        }
    }

    fn policy(&self) -> IdentityPolicySet {
        self.identity
            .map(|identity| identity.policy_set())
            .unwrap_or_default()
    }

    /// May the current identity send as `from`? Unauthenticated senders are
    /// not checked here; the disposition table limits what they can do.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptError::InvalidSender`] if the identity may not use
    /// `from`.
    pub fn check_sender(&self, from: &str) -> Result<(), AcceptError> {
        match self.identity {
            Some(identity) if !identity.is_valid_sender(from) => {
                tracing::debug!(%identity, from, "Sender not valid for identity");
                Err(AcceptError::InvalidSender {
                    from: from.to_string(),
                    identity: identity.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Decide what happens to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptError::Rejected`] if the disposition table refuses the
    /// recipient, or [`AcceptError::NotPermitted`] if the delivery backend
    /// will not take it.
    pub fn check_recipient(&self, from: &str, to: &str) -> Result<Disposition, AcceptError> {
        let resolution = self.resolver.resolve(to);
        let disposition = resolution.disposition(&self.policy(), self.identity.is_some());
        tracing::debug!(to, %resolution, ?disposition, "Recipient resolved");

        if let Disposition::Reject(reason) = disposition {
            return Err(Rejection::Recipient {
                recipient: to.to_string(),
                reason,
            }
            .into());
        }

        if !self.delivery.will_deliver(from, to, self.identity) {
            return Err(AcceptError::NotPermitted {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        Ok(disposition)
    }

    /// Run every check for `envelope`, returning each recipient's disposition
    /// in order.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn check(&self, envelope: &Envelope) -> Result<Vec<Disposition>, AcceptError> {
        self.check_sender(&envelope.from)?;

        if envelope.to.is_empty() {
            return Err(Rejection::NoRecipients.into());
        }

        if let Some(maximum) = self.policy().maximum_recipients
            && envelope.to.len() > maximum
        {
            return Err(Rejection::TooManyRecipients {
                count: envelope.to.len(),
                maximum,
            }
            .into());
        }

        envelope
            .to
            .iter()
            .map(|to| self.check_recipient(&envelope.from, to))
            .collect()
    }
}
