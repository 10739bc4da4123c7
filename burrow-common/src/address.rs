//! Envelope address parsing
//!
//! Addresses reach the backends as plain text from the SMTP layer, usually
//! still wrapped in the angle brackets of a `MAIL FROM`/`RCPT TO` path. The
//! parser here is deliberately narrower than RFC 5321: it only has to split
//! `mailbox@domain` reliably and refuse anything that could not name a
//! mailbox on disk.
//!
//! # Size Constraints
//!
//! - Maximum mailbox (local-part): 64 octets
//! - Maximum domain: 255 octets

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Domain, error::AddressError};

const MAX_MAILBOX: usize = 64;
const MAX_DOMAIN: usize = 255;

/// A parsed `mailbox@domain` pair.
///
/// The domain is canonical (see [`Domain`]); the mailbox is kept exactly as
/// written since local parts are case-sensitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    mailbox: String,
    domain: Domain,
}

impl Address {
    /// Parse `mailbox@domain`, optionally wrapped in `<...>`.
    ///
    /// The split happens at the last `@`, so a quoted local part containing
    /// `@` still yields the right domain.
    ///
    /// # Errors
    ///
    /// Returns an [`AddressError`] describing the first problem found.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        let inner = match (trimmed.strip_prefix('<'), trimmed.ends_with('>')) {
            (Some(rest), true) => &rest[..rest.len() - 1],
            (None, false) => trimmed,
            _ => return Err(AddressError::UnbalancedBrackets),
        };

        if let Some(c) = inner
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>'))
        {
            return Err(AddressError::InvalidCharacter(c));
        }

        let (mailbox, domain) = inner.rsplit_once('@').ok_or(AddressError::MissingAtSign)?;

        if mailbox.is_empty() {
            return Err(AddressError::EmptyMailbox);
        }
        if domain.is_empty() {
            return Err(AddressError::EmptyDomain);
        }
        if mailbox.len() > MAX_MAILBOX {
            return Err(AddressError::MailboxTooLong);
        }
        if domain.len() > MAX_DOMAIN {
            return Err(AddressError::DomainTooLong);
        }

        Ok(Self {
            mailbox: mailbox.to_string(),
            domain: Domain::new(domain),
        })
    }

    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    #[must_use]
    pub const fn domain(&self) -> &Domain {
        &self.domain
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.mailbox, self.domain)
    }
}
