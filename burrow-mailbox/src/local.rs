//! The `local` mailbox backend: one maildir per mailbox on the local disk.
//!
//! ```toml
//! [mailbox]
//! type = "local"
//! data = { maildir_path = "maildir", maildir_pattern = "$domain/$mailbox" }
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use burrow_common::{Address, AppConfig, BackendConfig, ConfigError, internal, mailbox};
use burrow_resolver::Resolver;
use burrow_spool::{Delivered, Maildir, SpooledMessageId};
use serde::Deserialize;

use crate::{
    Mailbox, MailboxService,
    error::{MailboxError, Result},
    pattern::MaildirPattern,
};

/// Options accepted in the `data` table of a `local` mailbox backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocalMailboxOptions {
    pub maildir_path: Option<PathBuf>,
    pub maildir_pattern: Option<MaildirPattern>,
}

/// Maildir storage rooted at `maildir_path`, gated by a resolver.
#[derive(Debug, Clone)]
pub struct LocalMailbox {
    maildir_path: PathBuf,
    pattern: MaildirPattern,
    resolver: Arc<dyn Resolver>,
}

impl LocalMailbox {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPath`] for a disallowed root and
    /// [`ConfigError::Directory`] if it cannot be created.
    pub fn new(
        maildir_path: impl Into<PathBuf>,
        pattern: MaildirPattern,
        resolver: Arc<dyn Resolver>,
    ) -> std::result::Result<Self, ConfigError> {
        let maildir_path = maildir_path.into();
        burrow_common::config::validate_storage_path(&maildir_path)?;

        std::fs::create_dir_all(&maildir_path).map_err(|source| ConfigError::Directory {
            path: maildir_path.clone(),
            source,
        })?;

        Ok(Self {
            maildir_path,
            pattern,
            resolver,
        })
    }

    /// Build the backend from a `local` mailbox configuration.
    ///
    /// # Errors
    ///
    /// See [`LocalMailbox::new`]; also [`ConfigError::InvalidOptions`] for a
    /// malformed `data` table, including an invalid pattern.
    pub fn from_config(
        config: &BackendConfig,
        app: &AppConfig,
        resolver: Arc<dyn Resolver>,
    ) -> std::result::Result<Self, ConfigError> {
        let options: LocalMailboxOptions = config.options("Mailbox")?;
        let path = app.storage_path(options.maildir_path.as_deref())?;

        let mailbox = Self::new(path, options.maildir_pattern.unwrap_or_default(), resolver)?;
        internal!(
            level = INFO,
            "Local mailboxes stored under {} with pattern {}",
            mailbox.maildir_path.display(),
            mailbox.pattern
        );

        Ok(mailbox)
    }

    #[must_use]
    pub fn maildir_path(&self) -> &Path {
        &self.maildir_path
    }

    #[must_use]
    pub const fn pattern(&self) -> &MaildirPattern {
        &self.pattern
    }

    /// Open the mailbox for an address already known to be local.
    fn user_mailbox(&self, address: Address) -> Result<UserMailbox> {
        let relative = self
            .pattern
            .expand(address.domain().as_str(), address.mailbox())?;

        Ok(UserMailbox {
            maildir: Maildir::new(self.maildir_path.join(relative)),
            address,
        })
    }
}

impl MailboxService for LocalMailbox {
    #[tracing::instrument(level = "debug", skip(self), err(Display))]
    fn open(&self, address: &str) -> Result<Box<dyn Mailbox>> {
        let resolution = self.resolver.resolve(address);
        mailbox!(level = DEBUG, "{address} resolved to {resolution}");

        if !resolution.is_local_mailbox() {
            return Err(MailboxError::NotFound {
                address: address.to_string(),
            });
        }

        let parsed = Address::parse(address).map_err(|_| MailboxError::NotFound {
            address: address.to_string(),
        })?;

        Ok(Box::new(self.user_mailbox(parsed)?))
    }
}

/// One user's maildir.
#[derive(Debug, Clone)]
pub struct UserMailbox {
    address: Address,
    maildir: Maildir,
}

impl UserMailbox {
    #[must_use]
    pub const fn maildir(&self) -> &Maildir {
        &self.maildir
    }
}

#[async_trait]
impl Mailbox for UserMailbox {
    fn address(&self) -> &Address {
        &self.address
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(address = %self.address, id = %message.id),
        err(Display)
    )]
    async fn store(&self, message: &Delivered) -> Result<PathBuf> {
        let name = message.id.maildir_filename();
        let live = self.maildir.new_dir().join(&name);

        self.maildir.ensure().await?;
        if tokio::fs::try_exists(&live).await? {
            mailbox!(level = DEBUG, "{} already holds {name}", self.address);
            return Ok(live);
        }

        // Concurrent stores of one id each stage privately; the last rename
        // wins with identical content.
        let staging_name = format!("{name}.{}", SpooledMessageId::generate());
        let mut staged = self.maildir.stage_as(&staging_name, &name).await?;
        staged.write_all(&message.message.data).await?;
        let live = staged.commit().await?;

        mailbox!(level = DEBUG, "Stored {name} for {}", self.address);

        Ok(live)
    }
}
