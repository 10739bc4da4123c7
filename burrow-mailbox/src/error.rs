use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailboxError {
    /// The address does not resolve to a local mailbox.
    #[error("Mailbox not found: {address}")]
    NotFound { address: String },

    /// I/O operation failed while storing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A domain or mailbox name cannot be used as a path component.
    #[error("Invalid mailbox path component {component:?}: {reason}")]
    InvalidPath {
        component: String,
        reason: &'static str,
    },
}

impl MailboxError {
    /// Whether this is an authorization failure rather than a storage one
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, MailboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = MailboxError::NotFound {
            address: "bob@example.com".to_string(),
        };
        assert_eq!(err.to_string(), "Mailbox not found: bob@example.com");
        assert!(err.is_not_found());

        let err = MailboxError::InvalidPath {
            component: "..".to_string(),
            reason: "reserved name",
        };
        assert_eq!(
            err.to_string(),
            "Invalid mailbox path component \"..\": reserved name"
        );
        assert!(!err.is_not_found());
    }
}
