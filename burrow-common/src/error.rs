//! Error types for the burrow-common crate.
//!
//! [`ConfigError`] covers everything that can go wrong while turning a
//! configuration into running backends. None of these are recoverable at
//! runtime, but it is up to the caller to decide whether that means exiting.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while parsing a textual mail address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Empty input
    #[error("Empty address")]
    Empty,

    /// Missing '@' separator
    #[error("Missing '@' separator in address")]
    MissingAtSign,

    /// Nothing before the '@'
    #[error("Address has an empty mailbox")]
    EmptyMailbox,

    /// Nothing after the '@'
    #[error("Address has an empty domain")]
    EmptyDomain,

    /// Mailbox exceeds 64 octets
    #[error("Mailbox exceeds 64 octets")]
    MailboxTooLong,

    /// Domain exceeds 255 octets
    #[error("Domain exceeds 255 octets")]
    DomainTooLong,

    /// Whitespace, control characters or brackets inside the address
    #[error("Invalid character {0:?} in address")]
    InvalidCharacter(char),

    /// Opening '<' without a closing '>' or vice versa
    #[error("Unbalanced angle brackets in address")]
    UnbalancedBrackets,
}

/// Errors raised while building backends from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No constructor is registered for the requested backend type.
    #[error("{service} backend type not recognised: {kind}")]
    UnknownBackend { service: &'static str, kind: String },

    /// A `ref` names a backend that is not defined under `[backends]`.
    #[error("{service} backend reference not defined: {reference}")]
    UnknownReference {
        service: &'static str,
        reference: String,
    },

    /// The backend's `data` table could not be deserialized.
    #[error("Invalid options for {service} backend: {source}")]
    InvalidOptions {
        service: &'static str,
        #[source]
        source: toml::de::Error,
    },

    /// A storage path failed validation.
    #[error("Invalid path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// A required directory could not be created or is not a directory.
    #[error("Unable to prepare directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file could not be read.
    #[error("Unable to read configuration {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for the expected layout.
    #[error("Unable to parse configuration {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A required service is missing from the configuration.
    #[error("Missing required section: {0}")]
    MissingSection(&'static str),
}
