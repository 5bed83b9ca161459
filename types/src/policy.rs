use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Consequence applied to an entity that fails verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PunishmentPolicy {
    /// Remove the entity from its session.
    #[default]
    Kick,
    /// Add the display name to the host's name exclusion list, then remove.
    Ban,
    /// Add the network address to the host's address exclusion list, then
    /// remove. Degrades to [`PunishmentPolicy::Kick`] when no address is known.
    BanByAddress,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown punishment {raw:?} (expected kick, ban or ban-ip)")]
pub struct UnknownPunishment {
    raw: String,
}

impl UnknownPunishment {
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl PunishmentPolicy {
    pub const ALL: [Self; 3] = [Self::Kick, Self::Ban, Self::BanByAddress];

    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kick => "kick",
            Self::Ban => "ban",
            Self::BanByAddress => "ban-ip",
        }
    }
}

impl FromStr for PunishmentPolicy {
    type Err = UnknownPunishment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kick" => Ok(Self::Kick),
            "ban" => Ok(Self::Ban),
            "ban-ip" | "ban_ip" | "banip" => Ok(Self::BanByAddress),
            _ => Err(UnknownPunishment { raw: s.to_string() }),
        }
    }
}

impl fmt::Display for PunishmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
