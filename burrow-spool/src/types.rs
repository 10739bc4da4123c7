use std::sync::{LazyLock, Mutex, PoisonError};

use ulid::{Generator, Ulid};

/// Maildir flag suffix appended to file names in mailbox stores.
pub const MAILDIR_SUFFIX: &str = ":2,";

/// Shared across the process so ids from concurrent deliveries are strictly
/// increasing within the same millisecond.
static GENERATOR: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

/// Identifier for a spooled message
///
/// A ULID: 48 bits of millisecond timestamp followed by 80 bits of
/// randomness, rendered as 26 Crockford base32 characters. It doubles as the
/// file name under the spool and mailbox directories. Consumers should treat
/// it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpooledMessageId {
    id: Ulid,
}

impl SpooledMessageId {
    /// Generate a new unique message ID
    ///
    /// Ids come from a monotonic generator; if it is exhausted for the
    /// current millisecond a fresh random ULID is used instead.
    #[must_use]
    pub fn generate() -> Self {
        let id = GENERATOR
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
            .unwrap_or_else(|_| Ulid::new());

        Self { id }
    }

    /// Parse a message ID from a file name like `01ARZ3NDEKTSV4RRFFQ69G5FAV`
    /// or, in a mailbox, `01ARZ3NDEKTSV4RRFFQ69G5FAV:2,`.
    ///
    /// Anything containing a path separator or `..` is rejected outright.
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.contains(['/', '\\']) || filename.contains("..") {
            return None;
        }

        let stem = filename.strip_suffix(MAILDIR_SUFFIX).unwrap_or(filename);
        let id = Ulid::from_string(stem).ok()?;

        Some(Self { id })
    }

    #[must_use]
    pub const fn new(id: Ulid) -> Self {
        Self { id }
    }

    #[must_use]
    pub const fn ulid(&self) -> Ulid {
        self.id
    }

    /// Milliseconds since the Unix epoch at which this id was generated
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }

    /// File name used for this message inside a mailbox
    #[must_use]
    pub fn maildir_filename(&self) -> String {
        format!("{}{MAILDIR_SUFFIX}", self.id)
    }
}

impl std::fmt::Display for SpooledMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl serde::Serialize for SpooledMessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_from_filename_validation() {
        assert!(SpooledMessageId::from_filename("01ARZ3NDEKTSV4RRFFQ69G5FAV").is_some());
        assert!(SpooledMessageId::from_filename("01ARZ3NDEKTSV4RRFFQ69G5FAV:2,").is_some());

        assert!(SpooledMessageId::from_filename("../etc/passwd").is_none());
        assert!(SpooledMessageId::from_filename("foo/01ARZ3NDEKTSV4RRFFQ69G5FAV").is_none());
        assert!(SpooledMessageId::from_filename("..\\windows\\system32").is_none());

        assert!(SpooledMessageId::from_filename("not_a_valid_ulid").is_none());
        assert!(SpooledMessageId::from_filename("1234567890").is_none());
        assert!(SpooledMessageId::from_filename("01ARZ3NDEKTSV4RRFFQ69G5FAV.eml").is_none());
        assert!(SpooledMessageId::from_filename("").is_none());
    }

    #[test]
    fn test_display_round_trips_through_filename() {
        let id = SpooledMessageId::generate();
        assert_eq!(SpooledMessageId::from_filename(&id.to_string()), Some(id.clone()));
        assert_eq!(
            SpooledMessageId::from_filename(&id.maildir_filename()),
            Some(id)
        );
    }

    #[test]
    fn test_generated_ids_are_strictly_increasing() {
        let ids: Vec<_> = (0..1000).map(|_| SpooledMessageId::generate()).collect();

        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
    }

    #[test]
    fn test_generated_ids_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..250)
                        .map(|_| SpooledMessageId::generate())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("generator thread panicked") {
                assert!(all.insert(id.clone()), "duplicate id {id}");
            }
        }
        assert_eq!(all.len(), 2000);
    }
}
