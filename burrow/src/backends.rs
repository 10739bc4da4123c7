use std::sync::Arc;

use burrow_auth::{AuthService, Identity};
use burrow_common::{ConfigError, internal};
use burrow_mailbox::MailboxService;
use burrow_resolver::Resolver;
use burrow_spool::{DeliveryService, SpooledMessage, SpooledMessageId};

use crate::{
    admission::{AcceptError, Admission},
    config::Config,
    registry::{Deps, Registries},
};

/// Every configured service, built once at startup.
#[derive(Debug, Clone)]
pub struct Backends {
    pub resolver: Arc<dyn Resolver>,
    pub auth: Option<Arc<dyn AuthService>>,
    pub delivery: Arc<dyn DeliveryService>,
    pub mailbox: Option<Arc<dyn MailboxService>>,
}

impl Backends {
    /// Build the backends named in `config` using the `local` registries.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] raised while resolving references or
    /// constructing a backend.
    pub fn load(config: &Config) -> Result<Self, ConfigError> {
        Self::load_with(config, &Registries::default())
    }

    /// Build the backends named in `config` using `registries`.
    ///
    /// `[resolver]` and `[delivery]` are required; `[auth]` and `[mailbox]`
    /// are optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSection`] for a missing required service
    /// and otherwise the first error from resolution or construction.
    pub fn load_with(config: &Config, registries: &Registries) -> Result<Self, ConfigError> {
        let app = config.app();
        let mut deps = Deps::default();

        let resolver_config = config
            .resolver
            .as_ref()
            .ok_or(ConfigError::MissingSection("resolver"))?;
        let resolver = registries.resolver.build(
            config.resolve("Resolver", resolver_config)?,
            &app,
            &deps,
        )?;
        deps.resolver = Some(Arc::clone(&resolver));

        let auth = config
            .auth
            .as_ref()
            .map(|auth| registries.auth.build(config.resolve("Auth", auth)?, &app, &deps))
            .transpose()?;

        let delivery_config = config
            .delivery
            .as_ref()
            .ok_or(ConfigError::MissingSection("delivery"))?;
        let delivery = registries.delivery.build(
            config.resolve("Delivery", delivery_config)?,
            &app,
            &deps,
        )?;

        let mailbox = config
            .mailbox
            .as_ref()
            .map(|mailbox| {
                registries
                    .mailbox
                    .build(config.resolve("Mailbox", mailbox)?, &app, &deps)
            })
            .transpose()?;

        internal!(
            level = INFO,
            "Backends loaded (auth: {}, mailbox: {})",
            auth.is_some(),
            mailbox.is_some()
        );

        Ok(Self {
            resolver,
            auth,
            delivery,
            mailbox,
        })
    }

    /// Check `message` against the admission rules and spool it.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptError::Rejected`], [`AcceptError::InvalidSender`] or
    /// [`AcceptError::NotPermitted`] when admission fails, and
    /// [`AcceptError::Delivery`] when spooling fails.
    pub async fn accept(
        &self,
        message: &SpooledMessage,
        identity: Option<&dyn Identity>,
    ) -> Result<SpooledMessageId, AcceptError> {
        Admission::new(self.resolver.as_ref(), self.delivery.as_ref(), identity)
            .check(&message.envelope)?;

        Ok(self.delivery.deliver(message).await?)
    }
}
