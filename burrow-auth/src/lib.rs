//! Sender authentication.
//!
//! An [`AuthService`] turns SASL exchanges into an [`Identity`]. Which
//! mechanisms are available is a property of each backend, not of the
//! server as a whole: the SMTP layer advertises exactly what
//! [`AuthService::mechanisms`] returns.

pub mod error;
pub mod local;
pub mod mechanisms;

use std::fmt::{Debug, Display};

use burrow_common::IdentityPolicySet;

pub use error::{AuthError, Result};
pub use local::{LocalAuth, LocalAuthOptions, LocalIdentity, LocalUser};
pub use mechanisms::{Mechanism, decode_plain};

/// An authenticated sender.
///
/// `Display` gives the identity's textual form, used in logs and
/// `Received` trails.
pub trait Identity: Display + Debug + Send + Sync {
    /// Whether this identity may use `sender` as its envelope sender.
    fn is_valid_sender(&self, sender: &str) -> bool;

    /// Policy overrides attached to this identity.
    fn policy_set(&self) -> IdentityPolicySet;
}

/// An authentication service implementation.
pub trait AuthService: Send + Sync + Debug {
    /// Run a mechanism over the client's responses.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] whose [`AuthError::reply_code`] is the SMTP
    /// reply the session should send.
    fn authenticate(&self, mechanism: &str, args: &[&str]) -> Result<Box<dyn Identity>>;

    /// Mechanisms this backend supports, in advertisement order.
    fn mechanisms(&self) -> Vec<Mechanism>;
}
