//! Configuration types handed to backend constructors.
//!
//! Every service (resolver, auth, delivery, mailbox) is configured with a
//! [`BackendConfig`]: a backend `type`, an optional `ref` to a shared
//! definition, and a free-form `data` table that the selected backend
//! deserializes into its own options struct.
//!
//! ```toml
//! [delivery]
//! type = "local"
//! data = { spool_path = "spool" }
//! ```

use std::{
    env,
    path::{Component, Path, PathBuf},
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::ConfigError;

/// Directories a spool or maildir root may never live under.
const SENSITIVE_PREFIXES: [&str; 9] = [
    "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
];

/// Configuration for a single backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend kind, matched case-insensitively against the registry
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Name of a shared definition under `[backends]` to use instead
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Backend specific options
    #[serde(default)]
    pub data: toml::Table,
}

impl BackendConfig {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Builder-style helper for setting a `data` entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// The normalised backend kind used for registry lookups.
    #[must_use]
    pub fn kind(&self) -> String {
        self.kind.trim().to_ascii_lowercase()
    }

    /// Deserialize the `data` table into a backend's options struct.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOptions`] when the table does not match `T`.
    pub fn options<T: DeserializeOwned>(&self, service: &'static str) -> Result<T, ConfigError> {
        toml::Value::Table(self.data.clone())
            .try_into()
            .map_err(|source| ConfigError::InvalidOptions { service, source })
    }
}

/// Application level settings the backends depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    rel_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rel_path: env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn new(rel_path: impl Into<PathBuf>) -> Self {
        Self {
            rel_path: rel_path.into(),
        }
    }

    /// Directory relative storage paths are resolved against.
    #[must_use]
    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }

    /// Resolve a configured storage root.
    ///
    /// An unset or empty path falls back to the system temporary directory,
    /// a relative one is joined onto [`Self::rel_path`]. The result is then
    /// validated with [`validate_storage_path`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPath`] if the resolved path is unsafe.
    pub fn storage_path(&self, configured: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = match configured {
            Some(path) if !path.as_os_str().is_empty() => {
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.rel_path.join(path)
                }
            }
            _ => env::temp_dir(),
        };

        validate_storage_path(&path)?;
        Ok(path)
    }
}

/// Check that a storage root is safe to write mail into.
///
/// Rejects relative paths, paths containing `..` and anything under a system
/// directory.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPath`] naming the failed check.
pub fn validate_storage_path(path: &Path) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(invalid("cannot contain '..' components"));
    }

    if !path.is_absolute() {
        return Err(invalid("must be absolute"));
    }

    if let Some(prefix) = SENSITIVE_PREFIXES
        .iter()
        .find(|prefix| path.starts_with(prefix))
    {
        return Err(invalid(&format!("cannot be in system directory {prefix}")));
    }

    Ok(())
}

/// Per-identity policy overrides.
///
/// Every field is optional: `None` means "inherit the default", which is
/// distinct from an explicit `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityPolicySet {
    /// Only accept recipients this node delivers to locally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_local_delivery: Option<bool>,

    /// Upper bound on recipients per message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_recipients: Option<usize>,

    /// Reject recipients in owned domains that have no mailbox
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_invalid_recipients: Option<bool>,
}

impl IdentityPolicySet {
    /// Whether every field is unset.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.require_local_delivery.is_none()
            && self.maximum_recipients.is_none()
            && self.reject_invalid_recipients.is_none()
    }
}
