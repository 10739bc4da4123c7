//! Property-based tests for the local resolver.
//!
//! Domains and mailboxes are generated, split at random between the primary
//! and secondary sets, and every resolution is checked against the
//! domain/mailbox state table.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;

use burrow_resolver::{DomainState, LocalResolver, MailboxState, ResolutionResult, Resolver};
use proptest::prelude::*;

fn domain_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{3,8}\\.(com|net|org)").expect("domain regex should be valid")
}

fn mailbox_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9._+-]{1,12}").expect("mailbox regex should be valid")
}

/// Arbitrary input text, most of which is not an address at all.
fn noise_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,40}").expect("noise regex should be valid")
}

#[derive(Debug, Clone)]
struct Layout {
    primary: BTreeSet<String>,
    secondary: BTreeSet<String>,
    mailboxes: BTreeSet<(String, String)>,
}

impl Layout {
    fn resolver(&self) -> LocalResolver {
        let mut builder = LocalResolver::builder();
        for domain in &self.primary {
            builder = builder.primary(domain.as_str());
        }
        for domain in &self.secondary {
            builder = builder.secondary(domain.as_str());
        }
        for (domain, mailbox) in &self.mailboxes {
            builder = builder.mailbox(domain.as_str(), mailbox.as_str());
        }
        builder.build()
    }
}

fn layout_strategy() -> impl Strategy<Value = Layout> {
    (
        prop::collection::btree_set(domain_strategy(), 0..6),
        prop::collection::btree_set(domain_strategy(), 0..6),
        prop::collection::vec((0usize..6, mailbox_strategy()), 0..12),
    )
        .prop_map(|(primary, secondary, raw_mailboxes)| {
            let secondary = secondary.difference(&primary).cloned().collect();
            let owned: Vec<_> = primary.iter().cloned().collect();
            let mailboxes = if owned.is_empty() {
                BTreeSet::new()
            } else {
                raw_mailboxes
                    .into_iter()
                    .map(|(index, mailbox)| (owned[index % owned.len()].clone(), mailbox))
                    .collect()
            };
            Layout {
                primary,
                secondary,
                mailboxes,
            }
        })
}

fn assert_invariant(result: ResolutionResult) {
    assert_eq!(
        result.mailbox() == MailboxState::LookupSkipped,
        result.domain() != DomainState::PrimaryLocal,
        "invariant violated by {result}"
    );
}

proptest! {
    #[test]
    fn unknown_domains_resolve_to_not_found(
        layout in layout_strategy(),
        domain in domain_strategy(),
        mailbox in mailbox_strategy(),
    ) {
        prop_assume!(!layout.primary.contains(&domain) && !layout.secondary.contains(&domain));

        let result = layout.resolver().resolve(&format!("{mailbox}@{domain}"));
        prop_assert_eq!(result, ResolutionResult::unknown());
    }

    #[test]
    fn secondary_domains_skip_mailbox_lookup(
        layout in layout_strategy(),
        mailbox in mailbox_strategy(),
    ) {
        let resolver = layout.resolver();
        for domain in &layout.secondary {
            let result = resolver.resolve(&format!("{mailbox}@{domain}"));
            prop_assert_eq!(result, ResolutionResult::secondary());
        }
    }

    #[test]
    fn primary_domains_report_mailbox_existence(
        layout in layout_strategy(),
        mailbox in mailbox_strategy(),
    ) {
        let resolver = layout.resolver();

        for (domain, known) in &layout.mailboxes {
            let result = resolver.resolve(&format!("{known}@{domain}"));
            prop_assert_eq!(result, ResolutionResult::primary(true));
        }

        for domain in &layout.primary {
            let exists = layout.mailboxes.contains(&(domain.clone(), mailbox.clone()));
            let result = resolver.resolve(&format!("{mailbox}@{domain}"));
            prop_assert_eq!(result, ResolutionResult::primary(exists));
        }
    }

    #[test]
    fn lookup_skipped_iff_not_primary(
        layout in layout_strategy(),
        domain in domain_strategy(),
        mailbox in mailbox_strategy(),
        noise in noise_strategy(),
    ) {
        let resolver = layout.resolver();

        assert_invariant(resolver.resolve(&format!("{mailbox}@{domain}")));
        assert_invariant(resolver.resolve(&noise));
        for domain in layout.primary.iter().chain(&layout.secondary) {
            assert_invariant(resolver.resolve(&format!("{mailbox}@{domain}")));
        }
    }
}

#[test]
fn secondary_local_scenario() {
    let resolver = LocalResolver::builder().secondary("example.com").build();

    let result = resolver.resolve("bob@example.com");
    assert_eq!(result.domain(), DomainState::SecondaryLocal);
    assert_eq!(result.mailbox(), MailboxState::LookupSkipped);
    assert!(!result.is_local_mailbox());
}
