use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Stable identity of a connecting entity.
///
/// Independent of the display name: renaming does not change it, and the
/// same real-world identity always reconnects with the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Uuid);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid identity {raw:?}: expected a UUID")]
pub struct InvalidIdentity {
    raw: String,
}

impl InvalidIdentity {
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl Identity {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for Identity {
    type Err = InvalidIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| InvalidIdentity { raw: s.to_string() })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated lowercase, the form written to the state file.
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Distinguishes successive connections of the same identity.
///
/// Issued by the gate on every connect; a watchdog armed for one connection
/// never acts on a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
