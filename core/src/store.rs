//! Durable verification state.
//!
//! The in-memory map is authoritative. Every mutation rewrites the whole file
//! from it (`verified.yml`):
//!
//! ```yaml
//! verified:
//!   - 0f8fad5b-d9cb-469f-a165-70867728950e
//! failed-attempts:
//!   7c9e6679-7425-40de-944b-e07fc1f90ae7: 2
//! ```
//!
//! Write failures are logged and otherwise ignored; the next successful write
//! or an explicit reload brings disk and memory back together.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::{fs, io::ErrorKind};

use serde::Serialize;
use serde_yaml::Value;
use thiserror::Error;

use invitegate_types::{Identity, VerificationRecord};
use invitegate_utils::{
    AtomicWriteOptions, atomic_write_new_with_options, atomic_write_with_options,
    recover_bak_file,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read state file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse state file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("failed to serialize verification state: {0}")]
    Serialize(#[source] serde_yaml::Error),
    #[error("failed to write state file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// On-disk schema. Zero attempt counts are omitted.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
struct StateDocument {
    verified: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    failed_attempts: BTreeMap<String, u32>,
}

impl StateDocument {
    fn from_records(records: &HashMap<Identity, VerificationRecord>) -> Self {
        let mut ordered: Vec<(&Identity, &VerificationRecord)> = records.iter().collect();
        ordered.sort_by_key(|(id, _)| **id);

        let mut doc = Self::default();
        for (id, record) in ordered {
            if record.is_verified() {
                doc.verified.push(id.to_string());
            } else if record.failed_attempts() > 0 {
                doc.failed_attempts
                    .insert(id.to_string(), record.failed_attempts());
            }
        }
        doc
    }
}

fn parse_identity(raw: &Value, section: &str) -> Option<Identity> {
    let Some(text) = raw.as_str() else {
        tracing::warn!(section, "Skipping non-string identity in state file: {raw:?}");
        return None;
    };
    match text.parse() {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(section, "Skipping entry: {e}");
            None
        }
    }
}

/// Build records from a parsed document, skipping anything malformed.
fn records_from_value(doc: &Value) -> HashMap<Identity, VerificationRecord> {
    let mut verified = HashSet::new();
    if let Some(list) = doc.get("verified").and_then(Value::as_sequence) {
        verified.extend(list.iter().filter_map(|raw| parse_identity(raw, "verified")));
    }

    let mut attempts = HashMap::new();
    if let Some(map) = doc.get("failed-attempts").and_then(Value::as_mapping) {
        for (raw_id, raw_count) in map {
            let Some(id) = parse_identity(raw_id, "failed-attempts") else {
                continue;
            };
            let Some(count) = raw_count.as_u64().and_then(|n| u32::try_from(n).ok()) else {
                tracing::warn!(identity = %id, "Skipping invalid attempt count: {raw_count:?}");
                continue;
            };
            attempts.insert(id, count);
        }
    }

    // A verified listing wins over a stale counter.
    verified
        .iter()
        .chain(attempts.keys())
        .map(|id| {
            let record = VerificationRecord::normalized(
                verified.contains(id),
                attempts.get(id).copied().unwrap_or(0),
            );
            (*id, record)
        })
        .filter(|(_, record)| !record.is_blank())
        .collect()
}

fn state_write_options() -> AtomicWriteOptions {
    AtomicWriteOptions {
        dir_sync: true,
        ..AtomicWriteOptions::default()
    }
}

/// Verification records plus the file that backs them.
#[derive(Debug)]
pub struct VerificationStore {
    path: PathBuf,
    records: HashMap<Identity, VerificationRecord>,
}

impl VerificationStore {
    /// Open the store at `path`, creating an empty state file if needed.
    ///
    /// Never fails: an unreadable file yields an empty store and an error log.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match Self::load(&path) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("{e}; starting with empty verification state");
                HashMap::new()
            }
        };
        tracing::info!(
            path = %path.display(),
            records = records.len(),
            "Verification state loaded"
        );
        Self { path, records }
    }

    /// Store that starts empty and never reads `path` (it is still written).
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: HashMap::new(),
        }
    }

    /// Read the state file. An absent file is created empty.
    pub fn load(path: &Path) -> Result<HashMap<Identity, VerificationRecord>, StoreError> {
        recover_bak_file(path);

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Self::create_empty(path);
                return Ok(HashMap::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let doc: Value = serde_yaml::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(records_from_value(&doc))
    }

    fn create_empty(path: &Path) {
        let result = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| {
                atomic_write_new_with_options(path, b"verified: []\n", state_write_options())
            });
        match result {
            Ok(()) => tracing::info!(path = %path.display(), "Created empty state file"),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => {
                tracing::error!(path = %path.display(), "Could not create state file: {e}");
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the state file from the full in-memory map.
    pub fn save_all(&self) -> Result<(), StoreError> {
        let doc = StateDocument::from_records(&self.records);
        let serialized = serde_yaml::to_string(&doc).map_err(StoreError::Serialize)?;
        atomic_write_with_options(&self.path, serialized.as_bytes(), state_write_options())
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Save, logging instead of failing.
    fn persist(&self) -> bool {
        match self.save_all() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("{e}; keeping in-memory state");
                false
            }
        }
    }

    /// Replace the in-memory map with the file's contents.
    ///
    /// On failure the current state is kept.
    pub fn reload(&mut self) -> Result<usize, StoreError> {
        let records = Self::load(&self.path)?;
        self.records = records;
        Ok(self.records.len())
    }

    #[must_use]
    pub fn is_verified(&self, id: &Identity) -> bool {
        self.records.get(id).is_some_and(VerificationRecord::is_verified)
    }

    #[must_use]
    pub fn record(&self, id: &Identity) -> VerificationRecord {
        self.records.get(id).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mark verified (clearing attempts) and persist.
    pub fn mark_verified(&mut self, id: Identity) {
        self.records.entry(id).or_default().mark_verified();
        self.persist();
    }

    /// Count a wrong code, persist, and return the new total.
    pub fn record_failure(&mut self, id: Identity) -> u32 {
        let attempts = self.records.entry(id).or_default().record_failure();
        self.persist();
        attempts
    }

    /// Zero every attempt counter and persist. Verified flags are untouched.
    ///
    /// Returns how many counters were non-zero.
    pub fn clear_attempts(&mut self) -> usize {
        let mut cleared = 0;
        for record in self.records.values_mut() {
            if record.failed_attempts() > 0 {
                record.clear_attempts();
                cleared += 1;
            }
        }
        self.records.retain(|_, record| !record.is_blank());
        self.persist();
        cleared
    }
}
