//! The `local` delivery backend: a maildir-style spool on the local disk.
//!
//! ```toml
//! [delivery]
//! type = "local"
//! data = { spool_path = "spool" }
//! ```
//!
//! A relative `spool_path` is resolved against the configuration's
//! `rel_path`; when it is absent the system temporary directory is used.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use burrow_common::{AppConfig, BackendConfig, ConfigError, Signal, internal, spool};
use serde::Deserialize;
use tokio::{io::AsyncRead, sync::broadcast};

use crate::{
    DeliveryService,
    error::Result,
    message::{Envelope, SpooledMessage},
    staging::{Maildir, STALE_AFTER},
    types::SpooledMessageId,
    watch::{self, Deliveries},
};

/// Options accepted in the `data` table of a `local` delivery backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocalDeliveryOptions {
    pub spool_path: Option<PathBuf>,
}

/// Spools accepted messages to `<spool_path>/tmp` and publishes them to
/// `<spool_path>/new`.
#[derive(Debug, Clone)]
pub struct LocalDelivery {
    spool: Maildir,
}

impl LocalDelivery {
    /// Open the spool at `path`, creating its directories and clearing
    /// abandoned staging files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPath`] for a disallowed path and
    /// [`ConfigError::Directory`] if the directories cannot be prepared.
    pub fn new(path: impl Into<PathBuf>) -> std::result::Result<Self, ConfigError> {
        let path = path.into();
        burrow_common::config::validate_storage_path(&path)?;

        internal!("Initialising spool at {} ...", path.display());
        let spool = Maildir::new(path);
        spool.init()?;

        if let Err(err) = spool.purge_stale(STALE_AFTER) {
            internal!(
                level = WARN,
                "Unable to clean staging directory {}: {err}",
                spool.tmp().display()
            );
        }

        Ok(Self { spool })
    }

    /// Build the backend from a `local` delivery configuration.
    ///
    /// # Errors
    ///
    /// See [`LocalDelivery::new`]; also [`ConfigError::InvalidOptions`] for a
    /// malformed `data` table.
    pub fn from_config(
        config: &BackendConfig,
        app: &AppConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let options: LocalDeliveryOptions = config.options("Delivery")?;
        let path = app.storage_path(options.spool_path.as_deref())?;

        let delivery = Self::new(path)?;
        internal!(
            level = INFO,
            "Local delivery spooling to {}",
            delivery.spool.root().display()
        );

        Ok(delivery)
    }

    #[must_use]
    pub fn spool_path(&self) -> &Path {
        self.spool.root()
    }

    #[must_use]
    pub const fn spool(&self) -> &Maildir {
        &self.spool
    }

    /// Spool a message whose body is read from `body`.
    ///
    /// The record only becomes visible in `new/` once the body has been fully
    /// written and synced.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DeliveryError::InvalidEnvelope`] for an unencodable
    /// envelope, or an I/O error if staging or publishing fails.
    pub async fn deliver_from<R>(
        &self,
        envelope: &Envelope,
        body: &mut R,
    ) -> Result<SpooledMessageId>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let header = envelope.encode()?;
        let id = SpooledMessageId::generate();

        let mut staged = self.spool.stage(&id.to_string()).await?;
        staged.write_all(&header).await?;
        staged.copy_from(body).await?;
        let live = staged.commit().await?;

        spool!(level = DEBUG, "Spooled message {id} to {}", live.display());

        Ok(id)
    }

    /// List the ids currently published in the spool, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if `new/` cannot be read.
    pub async fn list(&self) -> Result<Vec<SpooledMessageId>> {
        let mut entries = tokio::fs::read_dir(self.spool.new_dir()).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(SpooledMessageId::from_filename)
            {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Read a published message back from the spool.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if it does not exist or cannot be read, and a
    /// parse error if it is not a valid record.
    pub async fn read(&self, id: &SpooledMessageId) -> Result<SpooledMessage> {
        watch::load(&self.spool.new_dir().join(id.to_string())).await
    }
}

#[async_trait]
impl DeliveryService for LocalDelivery {
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(from = %message.envelope.from, recipients = message.envelope.to.len()),
        err(Display)
    )]
    async fn deliver(&self, message: &SpooledMessage) -> Result<SpooledMessageId> {
        let mut body: &[u8] = &message.data;
        self.deliver_from(&message.envelope, &mut body).await
    }

    fn deliveries(&self, shutdown: broadcast::Receiver<Signal>) -> Result<Deliveries> {
        watch::watch(self.spool.new_dir().to_path_buf(), shutdown)
    }
}
