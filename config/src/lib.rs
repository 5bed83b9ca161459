//! Configuration for the invite gate.
//!
//! The on-disk document is deliberately loose (every key optional, integers
//! signed, the punishment a free string) so that a hand-edited file always
//! loads. [`GateConfig::from_raw`] turns it into a snapshot whose values are
//! all usable, logging a warning for every value it had to replace.

use std::collections::BTreeSet;
use std::fmt;
use std::num::{NonZeroU32, NonZeroU64};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use serde::Deserialize;
use thiserror::Error;

use invitegate_types::PunishmentPolicy;
use invitegate_utils::{AtomicWriteOptions, atomic_write_new_with_options, translate_color_codes};

pub const CONFIG_FILE_NAME: &str = "config.yml";
pub const TOML_CONFIG_FILE_NAME: &str = "config.toml";
pub const STATE_FILE_NAME: &str = "verified.yml";

pub const DEFAULT_TIME_LIMIT_SECS: u64 = 60;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_KICK_MESSAGE: &str = "&cYou must use /join <code> to play!";
pub const DEFAULT_BAN_MESSAGE: &str = "&cYou are banned for not verifying with /join <code>.";

/// Written when the data directory has no configuration yet.
pub const DEFAULT_CONFIG_YAML: &str = r#"# Codes accepted by /join <code>. Any number of players may share a code.
invite-codes:
  - "CHANGE-ME"

# Seconds a new player has to verify before being punished.
time-limit: 60

# Wrong codes allowed before the punishment is applied immediately.
max-attempts: 3

# kick | ban | ban-ip
punishment: kick

kick-message: "&cYou must use /join <code> to play!"
ban-message: "&cYou are banned for not verifying with /join <code>."
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config at {}: {source}", .path.display())]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to write default config at {}: {source}", .path.display())]
    WriteDefault { path: PathBuf, source: io::Error },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::ParseYaml { path, .. }
            | ConfigError::ParseToml { path, .. }
            | ConfigError::WriteDefault { path, .. } => path,
        }
    }
}

/// Configuration document as written by operators.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawGateConfig {
    #[serde(default)]
    pub invite_codes: Vec<String>,
    pub time_limit: Option<i64>,
    pub max_attempts: Option<i64>,
    pub kick_message: Option<String>,
    pub ban_message: Option<String>,
    pub punishment: Option<String>,
}

/// Sanitised, immutable configuration snapshot.
#[derive(Clone, PartialEq, Eq)]
pub struct GateConfig {
    invite_codes: BTreeSet<String>,
    time_limit: NonZeroU64,
    max_attempts: NonZeroU32,
    punishment: PunishmentPolicy,
    kick_message: String,
    ban_message: String,
}

// Manual Debug impl to keep invite codes out of logs.
impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("invite_codes", &format_args!("[{} redacted]", self.invite_codes.len()))
            .field("time_limit", &self.time_limit)
            .field("max_attempts", &self.max_attempts)
            .field("punishment", &self.punishment)
            .field("kick_message", &self.kick_message)
            .field("ban_message", &self.ban_message)
            .finish()
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::from_raw(RawGateConfig::default())
    }
}

const FALLBACK_TIME_LIMIT: NonZeroU64 = match NonZeroU64::new(DEFAULT_TIME_LIMIT_SECS) {
    Some(value) => value,
    None => panic!("default time limit must be positive"),
};

const FALLBACK_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(DEFAULT_MAX_ATTEMPTS) {
    Some(value) => value,
    None => panic!("default max attempts must be positive"),
};

fn positive_u64(key: &str, value: Option<i64>, fallback: NonZeroU64) -> NonZeroU64 {
    let Some(value) = value else {
        return fallback;
    };
    match u64::try_from(value).ok().and_then(NonZeroU64::new) {
        Some(value) => value,
        None => {
            tracing::warn!(key, value, fallback = fallback.get(), "Config value must be positive; using default");
            fallback
        }
    }
}

fn positive_u32(key: &str, value: Option<i64>, fallback: NonZeroU32) -> NonZeroU32 {
    let Some(value) = value else {
        return fallback;
    };
    match u32::try_from(value).ok().and_then(NonZeroU32::new) {
        Some(value) => value,
        None => {
            tracing::warn!(key, value, fallback = fallback.get(), "Config value must be positive; using default");
            fallback
        }
    }
}

impl GateConfig {
    /// Sanitise an operator-written document.
    ///
    /// Never fails: `max-attempts <= 0` becomes the default rather than
    /// "unlimited", and an unknown punishment becomes `kick`.
    #[must_use]
    pub fn from_raw(raw: RawGateConfig) -> Self {
        let punishment = match raw.punishment.as_deref() {
            None => PunishmentPolicy::default(),
            Some(value) => value.parse().unwrap_or_else(|err| {
                tracing::warn!("{err}; falling back to kick");
                PunishmentPolicy::Kick
            }),
        };

        let invite_codes = raw
            .invite_codes
            .into_iter()
            .filter(|code| !code.is_empty())
            .collect();

        Self {
            invite_codes,
            time_limit: positive_u64("time-limit", raw.time_limit, FALLBACK_TIME_LIMIT),
            max_attempts: positive_u32("max-attempts", raw.max_attempts, FALLBACK_MAX_ATTEMPTS),
            punishment,
            kick_message: translate_color_codes(
                raw.kick_message.as_deref().unwrap_or(DEFAULT_KICK_MESSAGE),
            ),
            ban_message: translate_color_codes(
                raw.ban_message.as_deref().unwrap_or(DEFAULT_BAN_MESSAGE),
            ),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserialises as unit, not as an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<RawGateConfig>(content).map(Self::from_raw)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<RawGateConfig>(content).map(Self::from_raw)
    }

    /// Load and sanitise the file at `path`; the format follows the extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&content).map_err(|source| {
                tracing::warn!("Failed to parse config at {:?}: {}", path, source);
                ConfigError::ParseToml {
                    path: path.to_path_buf(),
                    source,
                }
            })
        } else {
            Self::from_yaml_str(&content).map_err(|source| {
                tracing::warn!("Failed to parse config at {:?}: {}", path, source);
                ConfigError::ParseYaml {
                    path: path.to_path_buf(),
                    source,
                }
            })
        }
    }

    /// Membership test only; codes are shared and never consumed.
    #[must_use]
    pub fn accepts(&self, code: &str) -> bool {
        self.invite_codes.contains(code)
    }

    #[must_use]
    pub fn invite_code_count(&self) -> usize {
        self.invite_codes.len()
    }

    #[must_use]
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit.get())
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u64 {
        self.time_limit.get()
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.get()
    }

    #[must_use]
    pub fn punishment(&self) -> PunishmentPolicy {
        self.punishment
    }

    #[must_use]
    pub fn kick_message(&self) -> &str {
        &self.kick_message
    }

    #[must_use]
    pub fn ban_message(&self) -> &str {
        &self.ban_message
    }

    // Builder-style setters for hosts that configure the gate in code.

    pub fn with_invite_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invite_codes = codes
            .into_iter()
            .map(Into::into)
            .filter(|code| !code.is_empty())
            .collect();
        self
    }

    pub fn with_time_limit(mut self, secs: NonZeroU64) -> Self {
        self.time_limit = secs;
        self
    }

    pub fn with_max_attempts(mut self, max: NonZeroU32) -> Self {
        self.max_attempts = max;
        self
    }

    pub fn with_punishment(mut self, policy: PunishmentPolicy) -> Self {
        self.punishment = policy;
        self
    }
}

/// Re-reads configuration on demand (admin `reload`).
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<GateConfig, ConfigError>;
}

/// Configuration backed by a file in the data directory.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Prefer `config.toml` when it exists, else `config.yml`.
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        let toml_path = data_dir.join(TOML_CONFIG_FILE_NAME);
        if toml_path.exists() {
            return Self::new(toml_path);
        }
        Self::new(data_dir.join(CONFIG_FILE_NAME))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write [`DEFAULT_CONFIG_YAML`] if no configuration exists yet.
    ///
    /// Returns `true` when a file was written.
    pub fn ensure_default(&self) -> Result<bool, ConfigError> {
        if self.path.exists() {
            return Ok(false);
        }
        let write_err = |source| ConfigError::WriteDefault {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        match atomic_write_new_with_options(
            &self.path,
            DEFAULT_CONFIG_YAML.as_bytes(),
            AtomicWriteOptions::default(),
        ) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Wrote default config");
                Ok(true)
            }
            // Someone else materialised it between the check and the rename.
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(write_err(err)),
        }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<GateConfig, ConfigError> {
        GateConfig::load(&self.path)
    }
}

/// Data directory: `$INVITEGATE_HOME`, else `~/.invitegate`.
pub fn data_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os("INVITEGATE_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    dirs::home_dir().map(|home| home.join(".invitegate"))
}
