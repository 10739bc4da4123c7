//! Address resolution.
//!
//! A resolver answers "will this node accept mail for this address, and
//! why": the domain is owned, relayed or unknown, and for owned domains the
//! mailbox either exists or does not. See [`ResolutionResult`].

pub mod local;
pub mod result;

use burrow_common::Address;

pub use local::{LocalResolver, LocalResolverOptions, MailboxDirectory, StaticDirectory};
pub use result::{Disposition, DomainState, MailboxState, RejectReason, ResolutionResult};

/// An address resolver implementation.
pub trait Resolver: Send + Sync + std::fmt::Debug {
    /// Resolve an already parsed address.
    fn resolve_address(&self, address: &Address) -> ResolutionResult;

    /// Resolve a textual address.
    ///
    /// This never fails: text that does not parse as an address is simply
    /// not something this node serves, and resolves to
    /// [`ResolutionResult::unknown`].
    fn resolve(&self, address: &str) -> ResolutionResult {
        Address::parse(address).map_or_else(
            |err| {
                tracing::debug!(address, %err, "Unresolvable address");
                ResolutionResult::unknown()
            },
            |address| self.resolve_address(&address),
        )
    }
}
