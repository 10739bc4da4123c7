//! Error types for spool delivery.

use std::io;

use thiserror::Error;

/// Errors raised while handing messages to, or reading them back from, a
/// delivery backend.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// I/O operation failed (directory create, file write, rename, read).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An envelope field would corrupt the spooled record.
    #[error("Invalid envelope {field}: {value:?} contains a line break")]
    InvalidEnvelope { field: &'static str, value: String },

    /// File watcher error.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// A spooled record could not be decoded.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Errors decoding a spooled record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The record ended before the blank line separating envelope and body.
    #[error("Missing blank line after envelope")]
    MissingSeparator,

    /// An envelope line was not `HELO:`, `FROM:` or `TO:`.
    #[error("Unexpected envelope line: {0:?}")]
    UnexpectedLine(String),

    /// `HELO:` or `FROM:` appeared more than once.
    #[error("Duplicate {0} line")]
    Duplicate(&'static str),

    /// An envelope line was not valid UTF-8.
    #[error("Envelope is not valid UTF-8")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
