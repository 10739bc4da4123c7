use std::{future::Future, path::Path};

use burrow_common::{ConfigError, Signal, internal, logging, tracing};
use tokio::sync::broadcast;

use crate::{backends::Backends, config::Config, router::Router};

/// The top-level service: loads the backends and routes spooled mail into
/// mailboxes until told to stop.
#[derive(Debug)]
pub struct Burrow {
    config: Config,
    shutdown: broadcast::Sender<Signal>,
}

impl Burrow {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (shutdown, _receiver) = broadcast::channel(64);
        Self { config, shutdown }
    }

    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Config::load(path).map(Self::new)
    }

    /// Sender for the shutdown broadcast; sending [`Signal::Shutdown`] stops
    /// a running instance.
    #[must_use]
    pub fn shutdown_handle(&self) -> broadcast::Sender<Signal> {
        self.shutdown.clone()
    }

    /// Run until CTRL+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the backends cannot be loaded, the spool cannot be
    /// watched, or the signal handlers cannot be installed.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown()).await
    }

    /// Run until `stop` completes or a shutdown signal is broadcast.
    ///
    /// # Errors
    ///
    /// See [`Burrow::run`].
    #[tracing::instrument(level = "trace", skip_all, err)]
    pub async fn run_until<F>(self, stop: F) -> anyhow::Result<()>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        logging::init();

        let backends = Backends::load(&self.config)?;
        let deliveries = backends.delivery.deliveries(self.shutdown.subscribe())?;
        let router = Router::new(backends.resolver, backends.mailbox);

        internal!("Controller running");
        let mut routing = tokio::spawn(router.run(deliveries));

        let mut signalled = self.shutdown.subscribe();
        let ret = tokio::select! {
            r = stop => r,
            _ = signalled.recv() => Ok(()),
            // The router only finishes on its own if the watcher dies.
            r = &mut routing => {
                r?;
                Err(anyhow::anyhow!("Spool watcher stopped unexpectedly"))
            }
        };

        internal!("Shutting down...");
        // No receivers left just means everything has already stopped.
        let _ = self.shutdown.send(Signal::Shutdown);

        if !routing.is_finished() {
            routing.await?;
        }
        let _ = self.shutdown.send(Signal::Finalised);

        ret
    }
}

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            r?;
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    Ok(())
}
