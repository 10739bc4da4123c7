//! Domain newtype
//!
//! Mail domains are case-insensitive, so a [`Domain`] is always stored in
//! its canonical form: ASCII-lowercased with any trailing root dot removed.
//! Two domains that route to the same place therefore compare and hash equal,
//! and the canonical form is what ends up in maildir paths.

use std::{
    fmt::{self, Display},
    ops::Deref,
    sync::Arc,
};

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Domain(Arc<str>);

impl Domain {
    /// Create a canonical `Domain`
    ///
    /// ```
    /// use burrow_common::Domain;
    ///
    /// assert_eq!(Domain::new("Mail.Example.COM.").as_str(), "mail.example.com");
    /// ```
    #[must_use]
    pub fn new(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        Self(Arc::from(trimmed.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for Domain {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Domain {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Domain {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// Configuration files may spell domains in any case
impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}
