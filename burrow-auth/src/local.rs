//! The `local` auth backend: identities listed in configuration.
//!
//! ```toml
//! [auth]
//! type = "local"
//!
//! [auth.data.users."alice@example.com"]
//! password = "hunter2"
//! senders = ["alice.smith@example.com", "@lists.example.com"]
//! policies = { maximum_recipients = 50 }
//! ```

use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::Arc,
};

use ahash::AHashMap;
use burrow_common::{
    Address, AppConfig, BackendConfig, ConfigError, Domain, IdentityPolicySet, internal,
};
use serde::Deserialize;

use crate::{
    AuthService, Identity,
    error::{AuthError, Result},
    mechanisms::{Mechanism, decode_plain},
};

/// A configured user.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocalUser {
    pub password: String,
    /// Extra sender addresses; an entry of the form `@domain` allows any
    /// mailbox in that domain
    pub senders: Vec<String>,
    pub policies: IdentityPolicySet,
}

/// Options accepted in the `data` table of a `local` auth backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalAuthOptions {
    pub mechanisms: Vec<Mechanism>,
    pub users: HashMap<String, LocalUser>,
}

impl Default for LocalAuthOptions {
    fn default() -> Self {
        Self {
            mechanisms: vec![Mechanism::Plain],
            users: HashMap::new(),
        }
    }
}

/// An identity authenticated against the local user table.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    name: Arc<str>,
    senders: Arc<[String]>,
    policies: IdentityPolicySet,
}

impl LocalIdentity {
    fn sender_matches(pattern: &str, sender: &Address) -> bool {
        pattern.strip_prefix('@').map_or_else(
            || Address::parse(pattern).is_ok_and(|allowed| &allowed == sender),
            |domain| &Domain::new(domain) == sender.domain(),
        )
    }
}

impl Display for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Identity for LocalIdentity {
    fn is_valid_sender(&self, sender: &str) -> bool {
        let Ok(sender) = Address::parse(sender) else {
            return false;
        };

        std::iter::once(self.name.as_ref())
            .chain(self.senders.iter().map(String::as_str))
            .any(|pattern| Self::sender_matches(pattern, &sender))
    }

    fn policy_set(&self) -> IdentityPolicySet {
        self.policies
    }
}

/// Auth backend over a static user table.
#[derive(Debug, Clone)]
pub struct LocalAuth {
    mechanisms: Vec<Mechanism>,
    users: AHashMap<String, LocalUser>,
}

impl LocalAuth {
    #[must_use]
    pub fn new(options: LocalAuthOptions) -> Self {
        Self {
            mechanisms: options.mechanisms,
            users: options.users.into_iter().collect(),
        }
    }

    /// Build the backend from a `local` auth configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOptions`] if the `data` table is malformed.
    pub fn from_config(
        config: &BackendConfig,
        _app: &AppConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let auth = Self::new(config.options("Auth")?);

        internal!(
            level = INFO,
            "Local auth loaded {} users, mechanisms {:?}",
            auth.users.len(),
            auth.mechanisms
        );

        Ok(auth)
    }

    fn identity(&self, user: &str, password: &str) -> Result<LocalIdentity> {
        match self.users.get(user) {
            Some(entry) if entry.password == password => Ok(LocalIdentity {
                name: Arc::from(user),
                senders: entry.senders.clone().into(),
                policies: entry.policies,
            }),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}

impl AuthService for LocalAuth {
    #[tracing::instrument(level = "debug", skip(self, args), err(Display))]
    fn authenticate(&self, mechanism: &str, args: &[&str]) -> Result<Box<dyn Identity>> {
        let mechanism: Mechanism = mechanism.parse()?;
        if !self.mechanisms.contains(&mechanism) {
            return Err(AuthError::UnsupportedMechanism(mechanism.to_string()));
        }

        match mechanism {
            Mechanism::Plain => {
                let response = args.first().ok_or_else(|| {
                    AuthError::MalformedResponse("missing initial response".to_string())
                })?;
                let (user, pass) = decode_plain(response)?;
                Ok(Box::new(self.identity(&user, &pass)?))
            }
        }
    }

    fn mechanisms(&self) -> Vec<Mechanism> {
        self.mechanisms.clone()
    }
}
