use thiserror::Error;

/// Authentication failures, each carrying the SMTP reply it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The client asked for a mechanism this backend does not offer.
    #[error("Unrecognised authentication type: {0}")]
    UnsupportedMechanism(String),

    /// The client response could not be decoded.
    #[error("Badly formed parameter: {0}")]
    MalformedResponse(String),

    /// The identity is unknown or the secret does not match.
    #[error("Authentication credentials invalid")]
    InvalidCredentials,
}

impl AuthError {
    /// Basic SMTP reply code
    #[must_use]
    pub const fn reply_code(&self) -> u16 {
        match self {
            Self::UnsupportedMechanism(_) => 504,
            Self::MalformedResponse(_) => 501,
            Self::InvalidCredentials => 535,
        }
    }

    /// RFC 3463 enhanced status code
    #[must_use]
    pub const fn enhanced_code(&self) -> &'static str {
        match self {
            Self::UnsupportedMechanism(_) => "5.5.4",
            Self::MalformedResponse(_) => "5.5.2",
            Self::InvalidCredentials => "5.7.8",
        }
    }

    /// Checks if the reply is a permanent rejection
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        self.reply_code() >= 500
    }
}

/// Specialized `Result` type for authentication.
pub type Result<T> = std::result::Result<T, AuthError>;
