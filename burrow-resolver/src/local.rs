//! The `local` resolver backend.
//!
//! Domain ownership comes straight from configuration:
//!
//! ```toml
//! [resolver]
//! type = "local"
//!
//! [resolver.data]
//! primary_domains = ["example.com"]
//! secondary_domains = ["backup.example.net"]
//!
//! [resolver.data.mailboxes]
//! "example.com" = ["alice", "bob"]
//! ```
//!
//! Mailbox existence is answered by a [`MailboxDirectory`]; by default that
//! is the static `mailboxes` table above.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use ahash::{AHashMap, AHashSet};
use burrow_common::{Address, AppConfig, BackendConfig, ConfigError, Domain, internal};
use serde::Deserialize;

use crate::{Resolver, ResolutionResult};

/// A source of truth for which mailboxes exist in the primary domains.
pub trait MailboxDirectory: Send + Sync + Debug {
    fn contains(&self, domain: &Domain, mailbox: &str) -> bool;
}

/// Options accepted in the `data` table of a `local` resolver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocalResolverOptions {
    pub primary_domains: Vec<Domain>,
    pub secondary_domains: Vec<Domain>,
    pub mailboxes: HashMap<Domain, Vec<String>>,
}

/// An in-memory mailbox index.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    mailboxes: AHashMap<Domain, AHashSet<String>>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: impl Into<Domain>, mailbox: impl Into<String>) {
        self.mailboxes
            .entry(domain.into())
            .or_default()
            .insert(mailbox.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mailboxes.values().map(|set| set.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MailboxDirectory for StaticDirectory {
    fn contains(&self, domain: &Domain, mailbox: &str) -> bool {
        self.mailboxes
            .get(domain)
            .is_some_and(|mailboxes| mailboxes.contains(mailbox))
    }
}

/// Resolver backed by configured domain sets.
#[derive(Debug, Clone)]
pub struct LocalResolver {
    primary: AHashSet<Domain>,
    secondary: AHashSet<Domain>,
    directory: Arc<dyn MailboxDirectory>,
}

impl LocalResolver {
    #[must_use]
    pub fn builder() -> LocalResolverBuilder {
        LocalResolverBuilder::default()
    }

    /// Build a resolver from parsed options.
    ///
    /// A domain listed as both primary and secondary is treated as primary.
    #[must_use]
    pub fn new(options: LocalResolverOptions) -> Self {
        let mut directory = StaticDirectory::new();
        for (domain, mailboxes) in options.mailboxes {
            for mailbox in mailboxes {
                directory.insert(domain.clone(), mailbox);
            }
        }

        let primary: AHashSet<Domain> = options.primary_domains.into_iter().collect();
        let secondary = options
            .secondary_domains
            .into_iter()
            .filter(|domain| !primary.contains(domain))
            .collect();

        Self {
            primary,
            secondary,
            directory: Arc::new(directory),
        }
    }

    /// Build a resolver from a `local` backend configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOptions`] if the `data` table is malformed.
    pub fn from_config(config: &BackendConfig, _app: &AppConfig) -> Result<Self, ConfigError> {
        let resolver = Self::new(config.options("Resolver")?);

        internal!(
            level = INFO,
            "Local resolver serving {} primary and {} secondary domains",
            resolver.primary.len(),
            resolver.secondary.len()
        );

        Ok(resolver)
    }

    /// Replace the mailbox directory.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn MailboxDirectory>) -> Self {
        self.directory = directory;
        self
    }

    #[must_use]
    pub fn is_primary(&self, domain: &Domain) -> bool {
        self.primary.contains(domain)
    }

    #[must_use]
    pub fn is_secondary(&self, domain: &Domain) -> bool {
        self.secondary.contains(domain)
    }
}

impl Resolver for LocalResolver {
    #[tracing::instrument(level = "debug", skip_all, fields(address = %address), ret(Display))]
    fn resolve_address(&self, address: &Address) -> ResolutionResult {
        let domain = address.domain();

        if self.is_primary(domain) {
            ResolutionResult::primary(self.directory.contains(domain, address.mailbox()))
        } else if self.is_secondary(domain) {
            ResolutionResult::secondary()
        } else {
            ResolutionResult::unknown()
        }
    }
}

/// Builder for [`LocalResolver`]
#[derive(Debug, Default)]
pub struct LocalResolverBuilder {
    options: LocalResolverOptions,
}

impl LocalResolverBuilder {
    #[must_use]
    pub fn primary(mut self, domain: impl Into<Domain>) -> Self {
        self.options.primary_domains.push(domain.into());
        self
    }

    #[must_use]
    pub fn secondary(mut self, domain: impl Into<Domain>) -> Self {
        self.options.secondary_domains.push(domain.into());
        self
    }

    #[must_use]
    pub fn mailbox(mut self, domain: impl Into<Domain>, mailbox: impl Into<String>) -> Self {
        self.options
            .mailboxes
            .entry(domain.into())
            .or_default()
            .push(mailbox.into());
        self
    }

    #[must_use]
    pub fn build(self) -> LocalResolver {
        LocalResolver::new(self.options)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use burrow_common::BackendConfig;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{DomainState, MailboxState};

    fn resolver() -> LocalResolver {
        LocalResolver::builder()
            .primary("example.com")
            .secondary("backup.example.net")
            .mailbox("example.com", "alice")
            .build()
    }

    #[test]
    fn test_primary_domain() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve("alice@example.com"),
            ResolutionResult::primary(true)
        );
        assert_eq!(
            resolver.resolve("carol@example.com"),
            ResolutionResult::primary(false)
        );
    }

    #[test]
    fn test_domain_match_is_case_insensitive() {
        assert_eq!(
            resolver().resolve("<alice@EXAMPLE.com>"),
            ResolutionResult::primary(true)
        );
    }

    #[test]
    fn test_mailbox_match_is_exact() {
        assert_eq!(
            resolver().resolve("Alice@example.com"),
            ResolutionResult::primary(false)
        );
    }

    #[test]
    fn test_secondary_and_unknown() {
        let resolver = resolver();
        let result = resolver.resolve("anyone@backup.example.net");
        assert_eq!(result.domain(), DomainState::SecondaryLocal);
        assert_eq!(result.mailbox(), MailboxState::LookupSkipped);

        assert_eq!(
            resolver.resolve("alice@elsewhere.org"),
            ResolutionResult::unknown()
        );
    }

    #[test]
    fn test_malformed_input_is_unknown() {
        let resolver = resolver();
        for input in ["", "not-an-address", "@example.com", "alice@", "<alice@example.com"] {
            assert_eq!(resolver.resolve(input), ResolutionResult::unknown(), "{input}");
        }
    }

    #[test]
    fn test_primary_wins_over_secondary() {
        let resolver = LocalResolver::builder()
            .primary("example.com")
            .secondary("example.com")
            .build();
        assert!(resolver.is_primary(&Domain::new("example.com")));
        assert!(!resolver.is_secondary(&Domain::new("example.com")));
    }

    #[test]
    fn test_static_directory_counts_across_domains() {
        let mut directory = StaticDirectory::new();
        assert!(directory.is_empty());

        directory.insert("example.com", "alice");
        directory.insert("example.com", "bob");
        directory.insert("example.com", "alice");
        directory.insert("example.org", "alice");

        assert_eq!(directory.len(), 3);
        assert!(!directory.is_empty());
        assert!(directory.contains(&Domain::new("example.org"), "alice"));
        assert!(!directory.contains(&Domain::new("example.org"), "bob"));
    }

    #[derive(Debug, Default)]
    struct CountingDirectory {
        lookups: AtomicUsize,
    }

    impl MailboxDirectory for CountingDirectory {
        fn contains(&self, _domain: &Domain, _mailbox: &str) -> bool {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_lookup_only_for_primary_domains() {
        let directory = Arc::new(CountingDirectory::default());
        let resolver = LocalResolver::builder()
            .primary("example.com")
            .secondary("backup.example.net")
            .build()
            .with_directory(directory.clone());

        resolver.resolve("bob@backup.example.net");
        resolver.resolve("bob@elsewhere.org");
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);

        assert_eq!(
            resolver.resolve("bob@example.com"),
            ResolutionResult::primary(true)
        );
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config() {
        let config: BackendConfig = toml::from_str(
            r#"
            type = "local"

            [data]
            primary_domains = ["Example.com"]
            secondary_domains = ["relay.example.net"]

            [data.mailboxes]
            "example.com" = ["alice", "bob"]
            "#,
        )
        .expect("valid config");

        let resolver =
            LocalResolver::from_config(&config, &AppConfig::new("/")).expect("valid options");
        assert_eq!(
            resolver.resolve("bob@example.com"),
            ResolutionResult::primary(true)
        );
        assert_eq!(
            resolver.resolve("bob@relay.example.net"),
            ResolutionResult::secondary()
        );
    }

    #[test]
    fn test_from_config_rejects_bad_options() {
        let config = BackendConfig::new("local").with("primary_domains", "example.com");
        assert!(LocalResolver::from_config(&config, &AppConfig::new("/")).is_err());
    }
}
