//! Mapping from `(domain, mailbox)` to a directory under the maildir root.

use std::{
    fmt::{self, Display},
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use burrow_common::ConfigError;
use serde::{Deserialize, Deserializer};

use crate::error::MailboxError;

pub const DOMAIN_TOKEN: &str = "$domain";
pub const MAILBOX_TOKEN: &str = "$mailbox";

/// Relative path template with `$domain` and `$mailbox` placeholders.
///
/// Both placeholders are required and each must fill a whole path component.
/// Substituted values may not contain separators, so distinct pairs never
/// share a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaildirPattern(String);

impl Default for MaildirPattern {
    fn default() -> Self {
        Self(format!("{DOMAIN_TOKEN}/{MAILBOX_TOKEN}"))
    }
}

impl MaildirPattern {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPath`] if the pattern is absolute,
    /// contains `..`, lacks either placeholder, or shares a path component
    /// between a placeholder and anything else.
    pub fn new(pattern: impl Into<String>) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        let invalid = |reason: &str| ConfigError::InvalidPath {
            path: PathBuf::from(&pattern),
            reason: reason.to_string(),
        };

        let path = Path::new(&pattern);
        if path.is_absolute() || path.has_root() {
            return Err(invalid("maildir pattern must be relative"));
        }
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(invalid("maildir pattern cannot contain '..' components"));
        }
        if !pattern.contains(DOMAIN_TOKEN) || !pattern.contains(MAILBOX_TOKEN) {
            return Err(invalid("maildir pattern must contain $domain and $mailbox"));
        }
        if pattern.split('/').any(|component| {
            component != DOMAIN_TOKEN
                && component != MAILBOX_TOKEN
                && (component.contains(DOMAIN_TOKEN) || component.contains(MAILBOX_TOKEN))
        }) {
            return Err(invalid(
                "maildir pattern placeholders must each be a whole path component",
            ));
        }

        Ok(Self(pattern))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute both placeholders, returning the relative mailbox directory.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::InvalidPath`] if either value is empty, `.`,
    /// `..`, or contains `/`, `\` or NUL.
    pub fn expand(&self, domain: &str, mailbox: &str) -> Result<PathBuf, MailboxError> {
        check_component(domain)?;
        check_component(mailbox)?;

        // Split first so a substituted value is never itself expanded.
        let expanded = self
            .0
            .split(DOMAIN_TOKEN)
            .map(|part| part.replace(MAILBOX_TOKEN, mailbox))
            .collect::<Vec<_>>()
            .join(domain);

        Ok(PathBuf::from(expanded))
    }
}

fn check_component(value: &str) -> Result<(), MailboxError> {
    let invalid = |reason| MailboxError::InvalidPath {
        component: value.to_string(),
        reason,
    };

    match value {
        "" => Err(invalid("empty name")),
        "." | ".." => Err(invalid("reserved name")),
        _ if value.contains(['/', '\\', '\0']) => Err(invalid("contains a path separator")),
        _ => Ok(()),
    }
}

impl FromStr for MaildirPattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for MaildirPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MaildirPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pattern = String::deserialize(deserializer)?;
        Self::new(pattern).map_err(serde::de::Error::custom)
    }
}
