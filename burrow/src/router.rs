//! Moves spooled messages into local mailboxes.

use std::sync::Arc;

use burrow_common::{internal, mailbox};
use burrow_mailbox::MailboxService;
use burrow_resolver::{DomainState, Resolver};
use burrow_spool::{Deliveries, Delivered};

/// What happened to each recipient of one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Routed {
    /// Stored in a local mailbox
    pub stored: usize,
    /// Not in an owned domain, or no mailbox backend; left for other
    /// consumers of the spool
    pub remote: usize,
    /// In an owned domain but without a mailbox, or opening or storing failed
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Router {
    resolver: Arc<dyn Resolver>,
    mailboxes: Option<Arc<dyn MailboxService>>,
}

impl Router {
    #[must_use]
    pub const fn new(
        resolver: Arc<dyn Resolver>,
        mailboxes: Option<Arc<dyn MailboxService>>,
    ) -> Self {
        Self {
            resolver,
            mailboxes,
        }
    }

    /// Store `delivered` in the mailbox of every recipient that resolves to
    /// an existing local mailbox. Failures are logged and counted, including
    /// recipients in an owned domain with no mailbox.
    pub async fn route(&self, delivered: &Delivered) -> Routed {
        let mut routed = Routed::default();

        for to in &delivered.message.envelope.to {
            let resolution = self.resolver.resolve(to);
            if resolution.domain() != DomainState::PrimaryLocal {
                mailbox!(
                    level = DEBUG,
                    "{} for <{to}> is {resolution}, leaving for relay",
                    delivered.id
                );
                routed.remote += 1;
                continue;
            }

            // Admission may accept unknown mailboxes in owned domains, but
            // nothing downstream of this node will take them.
            if !resolution.is_local_mailbox() {
                mailbox!(
                    level = ERROR,
                    "{} for <{to}> has no local mailbox, not stored",
                    delivered.id
                );
                routed.failed += 1;
                continue;
            }

            let Some(mailboxes) = self.mailboxes.as_ref() else {
                mailbox!(
                    level = DEBUG,
                    "{} for <{to}> is local but no mailbox backend is configured",
                    delivered.id
                );
                routed.remote += 1;
                continue;
            };

            let stored = match mailboxes.open(to) {
                Ok(mailbox) => mailbox.store(delivered).await,
                Err(err) => Err(err),
            };

            match stored {
                Ok(path) => {
                    mailbox!(
                        level = INFO,
                        "Stored {} for <{to}> at {}",
                        delivered.id,
                        path.display()
                    );
                    routed.stored += 1;
                }
                Err(err) => {
                    mailbox!(level = ERROR, "Unable to store {} for <{to}>: {err}", delivered.id);
                    routed.failed += 1;
                }
            }
        }

        routed
    }

    /// Route every message from `deliveries` until the stream ends.
    ///
    /// Returns the number of messages seen.
    pub async fn run(self, mut deliveries: Deliveries) -> usize {
        let mut seen = 0;

        while let Some(delivered) = deliveries.recv().await {
            seen += 1;
            let routed = self.route(&delivered).await;
            internal!(
                level = DEBUG,
                "Routed {}: {} stored, {} remote, {} failed",
                delivered.id,
                routed.stored,
                routed.remote,
                routed.failed
            );
        }

        internal!(level = INFO, "Router stopped after {seen} messages");
        seen
    }
}
