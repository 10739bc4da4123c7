//! Backend constructors keyed by `type`.
//!
//! Each service has its own [`Registry`]. Lookups happen once, at startup,
//! and yield a trait object that is used for the life of the process.

use std::sync::Arc;

use ahash::AHashMap;
use burrow_auth::{AuthService, LocalAuth};
use burrow_common::{AppConfig, BackendConfig, ConfigError};
use burrow_mailbox::{LocalMailbox, MailboxService};
use burrow_resolver::{LocalResolver, Resolver};
use burrow_spool::{DeliveryService, LocalDelivery};

/// Kind used when a backend config leaves `type` empty.
pub const DEFAULT_KIND: &str = "local";

/// Services already built that later constructors may depend on.
#[derive(Debug, Clone, Default)]
pub struct Deps {
    pub resolver: Option<Arc<dyn Resolver>>,
}

pub type Constructor<S> =
    fn(&BackendConfig, &AppConfig, &Deps) -> Result<Arc<S>, ConfigError>;

pub struct Registry<S: ?Sized> {
    service: &'static str,
    constructors: AHashMap<String, Constructor<S>>,
}

impl<S: ?Sized> std::fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.constructors.keys().collect();
        kinds.sort();

        f.debug_struct("Registry")
            .field("service", &self.service)
            .field("kinds", &kinds)
            .finish()
    }
}

impl<S: ?Sized> Registry<S> {
    #[must_use]
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            constructors: AHashMap::new(),
        }
    }

    /// Register `constructor` for `kind`, replacing any previous one.
    #[must_use]
    pub fn with(mut self, kind: &str, constructor: Constructor<S>) -> Self {
        self.register(kind, constructor);
        self
    }

    pub fn register(&mut self, kind: &str, constructor: Constructor<S>) {
        self.constructors
            .insert(kind.trim().to_ascii_lowercase(), constructor);
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.constructors
            .contains_key(&kind.trim().to_ascii_lowercase())
    }

    /// Construct the backend selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownBackend`] for an unregistered kind, or
    /// whatever the constructor itself fails with.
    pub fn build(
        &self,
        config: &BackendConfig,
        app: &AppConfig,
        deps: &Deps,
    ) -> Result<Arc<S>, ConfigError> {
        let kind = match config.kind() {
            kind if kind.is_empty() => DEFAULT_KIND.to_string(),
            kind => kind,
        };

        let constructor =
            self.constructors
                .get(&kind)
                .ok_or_else(|| ConfigError::UnknownBackend {
                    service: self.service,
                    kind: config.kind.clone(),
                })?;

        constructor(config, app, deps)
    }
}

fn local_resolver(
    config: &BackendConfig,
    app: &AppConfig,
    _deps: &Deps,
) -> Result<Arc<dyn Resolver>, ConfigError> {
    let resolver: Arc<dyn Resolver> = Arc::new(LocalResolver::from_config(config, app)?);
    Ok(resolver)
}

fn local_auth(
    config: &BackendConfig,
    app: &AppConfig,
    _deps: &Deps,
) -> Result<Arc<dyn AuthService>, ConfigError> {
    let auth: Arc<dyn AuthService> = Arc::new(LocalAuth::from_config(config, app)?);
    Ok(auth)
}

fn local_delivery(
    config: &BackendConfig,
    app: &AppConfig,
    _deps: &Deps,
) -> Result<Arc<dyn DeliveryService>, ConfigError> {
    let delivery: Arc<dyn DeliveryService> = Arc::new(LocalDelivery::from_config(config, app)?);
    Ok(delivery)
}

fn local_mailbox(
    config: &BackendConfig,
    app: &AppConfig,
    deps: &Deps,
) -> Result<Arc<dyn MailboxService>, ConfigError> {
    let resolver = deps
        .resolver
        .clone()
        .ok_or(ConfigError::MissingSection("resolver"))?;

    let mailbox: Arc<dyn MailboxService> =
        Arc::new(LocalMailbox::from_config(config, app, resolver)?);
    Ok(mailbox)
}

/// One registry per service.
#[derive(Debug)]
pub struct Registries {
    pub resolver: Registry<dyn Resolver>,
    pub auth: Registry<dyn AuthService>,
    pub delivery: Registry<dyn DeliveryService>,
    pub mailbox: Registry<dyn MailboxService>,
}

impl Default for Registries {
    /// Registries with the `local` backends.
    fn default() -> Self {
        Self {
            resolver: Registry::new("Resolver").with(DEFAULT_KIND, local_resolver),
            auth: Registry::new("Auth").with(DEFAULT_KIND, local_auth),
            delivery: Registry::new("Delivery").with(DEFAULT_KIND, local_delivery),
            mailbox: Registry::new("Mailbox").with(DEFAULT_KIND, local_mailbox),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use burrow_common::Address;
    use burrow_resolver::{DomainState, ResolutionResult};

    use super::*;

    #[derive(Debug)]
    struct Everything;

    impl Resolver for Everything {
        fn resolve_address(&self, _address: &Address) -> ResolutionResult {
            ResolutionResult::primary(true)
        }
    }

    fn everything(
        _config: &BackendConfig,
        _app: &AppConfig,
        _deps: &Deps,
    ) -> Result<Arc<dyn Resolver>, ConfigError> {
        Ok(Arc::new(Everything))
    }

    #[test]
    fn test_unknown_kind() {
        let registries = Registries::default();
        let err = registries
            .delivery
            .build(&BackendConfig::new("mongodb"), &AppConfig::default(), &Deps::default())
            .expect_err("not registered");

        assert_eq!(err.to_string(), "Delivery backend type not recognised: mongodb");
    }

    #[test]
    fn test_kind_is_case_insensitive_and_defaults_to_local() {
        let registries = Registries::default();
        let app = AppConfig::new("/srv/burrow");

        for kind in ["local", "LOCAL", " Local ", ""] {
            let resolver = registries
                .resolver
                .build(
                    &BackendConfig::new(kind).with("primary_domains", vec!["example.com"]),
                    &app,
                    &Deps::default(),
                )
                .unwrap();
            assert_eq!(
                resolver.resolve("x@example.com").domain(),
                DomainState::PrimaryLocal
            );
        }
    }

    #[test]
    fn test_custom_backend() {
        let registry = Registry::<dyn Resolver>::new("Resolver").with("everything", everything);
        assert!(registry.contains("Everything"));
        assert!(!registry.contains("local"));

        let resolver = registry
            .build(
                &BackendConfig::new("everything"),
                &AppConfig::default(),
                &Deps::default(),
            )
            .unwrap();
        assert!(resolver.resolve("anyone@anywhere.test").is_local_mailbox());
    }

    #[test]
    fn test_mailbox_needs_resolver() {
        let temp = tempfile::TempDir::new().unwrap();
        let registries = Registries::default();

        let err = registries
            .mailbox
            .build(
                &BackendConfig::new("local"),
                &AppConfig::new(temp.path()),
                &Deps::default(),
            )
            .expect_err("no resolver");
        assert!(matches!(err, ConfigError::MissingSection("resolver")));
    }
}
