//! The configuration file.
//!
//! ```toml
//! rel_path = "/var/lib/burrow"
//!
//! [backends.shared]
//! type = "local"
//! data = { primary_domains = ["example.com"], mailboxes = { "example.com" = ["alice"] } }
//!
//! [resolver]
//! ref = "shared"
//!
//! [delivery]
//! type = "local"
//! data = { spool_path = "spool" }
//!
//! [mailbox]
//! type = "local"
//! data = { maildir_path = "maildir" }
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use burrow_common::{AppConfig, BackendConfig, ConfigError, internal};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base for relative storage paths; defaults to the config file's directory
    pub rel_path: Option<PathBuf>,
    /// Named backend definitions that services can `ref`
    pub backends: HashMap<String, BackendConfig>,
    pub resolver: Option<BackendConfig>,
    pub auth: Option<BackendConfig>,
    pub delivery: Option<BackendConfig>,
    pub mailbox: Option<BackendConfig>,

    #[serde(skip)]
    base: PathBuf,
}

impl Config {
    /// Read and parse the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let read_error = |source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        };

        let text = std::fs::read_to_string(path).map_err(read_error)?;
        let absolute = std::path::absolute(path).map_err(read_error)?;
        let base = absolute
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);

        let config = Self::parse(&text, base).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        internal!(level = INFO, "Loaded configuration from {}", path.display());

        Ok(config)
    }

    /// Parse configuration text; relative paths are resolved against `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid.
    pub fn parse(text: &str, base: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let base = base.into();
        let mut config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: base.clone(),
            source,
        })?;
        config.base = base;

        Ok(config)
    }

    /// Application settings handed to every backend constructor.
    #[must_use]
    pub fn app(&self) -> AppConfig {
        let rel_path = match &self.rel_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.base.join(path),
            None => self.base.clone(),
        };

        AppConfig::new(rel_path)
    }

    /// Follow `ref` to its named definition, if set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownReference`] when the name is not under
    /// `[backends]`, or when the named definition itself has a `ref`.
    pub fn resolve<'a>(
        &'a self,
        service: &'static str,
        config: &'a BackendConfig,
    ) -> Result<&'a BackendConfig, ConfigError> {
        let Some(reference) = &config.reference else {
            return Ok(config);
        };

        match self.backends.get(reference) {
            Some(named) if named.reference.is_none() => Ok(named),
            _ => Err(ConfigError::UnknownReference {
                service,
                reference: reference.clone(),
            }),
        }
    }
}
