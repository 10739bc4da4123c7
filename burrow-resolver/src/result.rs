use std::fmt::{self, Display};

use burrow_common::IdentityPolicySet;
use serde::Serialize;

/// The result of a domain lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DomainState {
    /// The domain is not served by this node. This includes outbound mail
    /// to domains hosted elsewhere.
    NotFound,
    /// This node owns mailboxes for the domain.
    PrimaryLocal,
    /// This node accepts mail for the domain without owning its mailboxes,
    /// e.g. as a backup MX or an inter-network relay.
    SecondaryLocal,
}

/// The result of a mailbox lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MailboxState {
    /// No lookup was performed because the domain is not primary local.
    LookupSkipped,
    NotFound,
    Found,
}

/// Why a recipient is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RejectReason {
    /// The domain is ours but the mailbox does not exist.
    UnknownMailbox,
    /// The domain is not ours and the sender may not relay.
    RelayDenied,
    /// The sender's policy only allows local delivery.
    LocalDeliveryRequired,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownMailbox => "mailbox unavailable",
            Self::RelayDenied => "relay access denied",
            Self::LocalDeliveryRequired => "only local delivery is permitted",
        })
    }
}

/// What to do with a recipient once it has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Disposition {
    /// Accept into a local mailbox.
    Local,
    /// Accept for onward relay.
    Relay,
    /// Refuse the recipient.
    Reject(RejectReason),
}

/// An address resolution result.
///
/// `mailbox` is [`MailboxState::LookupSkipped`] if and only if `domain` is
/// not [`DomainState::PrimaryLocal`]. The constructors are the only way to
/// build one, so the pairing cannot be violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResolutionResult {
    domain: DomainState,
    mailbox: MailboxState,
}

impl ResolutionResult {
    /// The domain is not served here.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            domain: DomainState::NotFound,
            mailbox: MailboxState::LookupSkipped,
        }
    }

    /// The domain is accepted for relay.
    #[must_use]
    pub const fn secondary() -> Self {
        Self {
            domain: DomainState::SecondaryLocal,
            mailbox: MailboxState::LookupSkipped,
        }
    }

    /// The domain is owned here; `found` is the outcome of the mailbox lookup.
    #[must_use]
    pub const fn primary(found: bool) -> Self {
        Self {
            domain: DomainState::PrimaryLocal,
            mailbox: if found {
                MailboxState::Found
            } else {
                MailboxState::NotFound
            },
        }
    }

    #[must_use]
    pub const fn domain(&self) -> DomainState {
        self.domain
    }

    #[must_use]
    pub const fn mailbox(&self) -> MailboxState {
        self.mailbox
    }

    /// `{PrimaryLocal, Found}`: the only state a mailbox may be opened in.
    #[must_use]
    pub const fn is_local_mailbox(&self) -> bool {
        matches!(
            (self.domain, self.mailbox),
            (DomainState::PrimaryLocal, MailboxState::Found)
        )
    }

    /// Decide what to do with a recipient in this state.
    ///
    /// `policy` is the sending identity's policy set, and `authenticated`
    /// says whether there is a sending identity at all. Unset policy fields
    /// take their defaults: invalid recipients are rejected and relaying is
    /// allowed for authenticated senders.
    #[must_use]
    pub fn disposition(&self, policy: &IdentityPolicySet, authenticated: bool) -> Disposition {
        match (self.domain, self.mailbox) {
            (DomainState::PrimaryLocal, MailboxState::Found) => Disposition::Local,
            (DomainState::PrimaryLocal, _) => {
                if policy.reject_invalid_recipients.unwrap_or(true) {
                    Disposition::Reject(RejectReason::UnknownMailbox)
                } else {
                    Disposition::Local
                }
            }
            (DomainState::SecondaryLocal, _) => Disposition::Relay,
            (DomainState::NotFound, _) if !authenticated => {
                Disposition::Reject(RejectReason::RelayDenied)
            }
            (DomainState::NotFound, _) => {
                if policy.require_local_delivery.unwrap_or(false) {
                    Disposition::Reject(RejectReason::LocalDeliveryRequired)
                } else {
                    Disposition::Relay
                }
            }
        }
    }
}

impl Default for ResolutionResult {
    fn default() -> Self {
        Self::unknown()
    }
}

impl Display for ResolutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:?}, {:?}}}", self.domain, self.mailbox)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_constructors_pair_states() {
        assert_eq!(
            (ResolutionResult::unknown().domain(), ResolutionResult::unknown().mailbox()),
            (DomainState::NotFound, MailboxState::LookupSkipped)
        );
        assert_eq!(
            ResolutionResult::secondary().mailbox(),
            MailboxState::LookupSkipped
        );
        assert_eq!(ResolutionResult::primary(true).mailbox(), MailboxState::Found);
        assert_eq!(
            ResolutionResult::primary(false).mailbox(),
            MailboxState::NotFound
        );
        assert_eq!(ResolutionResult::default(), ResolutionResult::unknown());
    }

    #[test]
    fn test_is_local_mailbox() {
        assert!(ResolutionResult::primary(true).is_local_mailbox());
        assert!(!ResolutionResult::primary(false).is_local_mailbox());
        assert!(!ResolutionResult::secondary().is_local_mailbox());
        assert!(!ResolutionResult::unknown().is_local_mailbox());
    }

    #[test]
    fn test_disposition_defaults() {
        let policy = IdentityPolicySet::default();

        assert_eq!(
            ResolutionResult::primary(true).disposition(&policy, false),
            Disposition::Local
        );
        assert_eq!(
            ResolutionResult::primary(false).disposition(&policy, false),
            Disposition::Reject(RejectReason::UnknownMailbox)
        );
        assert_eq!(
            ResolutionResult::secondary().disposition(&policy, false),
            Disposition::Relay
        );
        assert_eq!(
            ResolutionResult::unknown().disposition(&policy, false),
            Disposition::Reject(RejectReason::RelayDenied)
        );
        assert_eq!(
            ResolutionResult::unknown().disposition(&policy, true),
            Disposition::Relay
        );
    }

    #[test]
    fn test_disposition_policy_overrides() {
        let accept_invalid = IdentityPolicySet {
            reject_invalid_recipients: Some(false),
            ..Default::default()
        };
        assert_eq!(
            ResolutionResult::primary(false).disposition(&accept_invalid, true),
            Disposition::Local
        );

        let local_only = IdentityPolicySet {
            require_local_delivery: Some(true),
            ..Default::default()
        };
        assert_eq!(
            ResolutionResult::unknown().disposition(&local_only, true),
            Disposition::Reject(RejectReason::LocalDeliveryRequired)
        );
        assert_eq!(
            ResolutionResult::primary(true).disposition(&local_only, true),
            Disposition::Local
        );

        let explicit_relay = IdentityPolicySet {
            require_local_delivery: Some(false),
            ..Default::default()
        };
        assert_eq!(
            ResolutionResult::unknown().disposition(&explicit_relay, true),
            Disposition::Relay
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ResolutionResult::primary(true).to_string(),
            "{PrimaryLocal, Found}"
        );
        assert_eq!(
            RejectReason::RelayDenied.to_string(),
            "relay access denied"
        );
    }
}
