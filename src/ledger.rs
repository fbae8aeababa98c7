//! Persisted record of applied patch steps.
//!
//! Text probes alone cannot tell "already migrated" from "target drifted".
//! The ledger records each `(set, step)` applied to an artifact together
//! with a fingerprint of the replacement it inserted, so a rerun can skip
//! by lookup. An entry counts while the artifact still contains that
//! replacement, or while the step's pattern no longer matches (a later
//! step may have rewritten the inserted text). Reverting the file brings
//! the pattern back and the step applies again.

use crate::store::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

const LEDGER_VERSION: u32 = 1;

/// Default ledger location relative to the project root.
pub const DEFAULT_LEDGER_PATH: &str = ".text-patcher/ledger.json";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("failed to read ledger {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write ledger {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("malformed ledger {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unsupported ledger version {found} in {path}")]
    Version { path: PathBuf, found: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub set: String,
    pub step: String,
    /// xxh3-64 of the rendered replacement, lowercase hex
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    version: u32,
    #[serde(default)]
    artifacts: BTreeMap<String, Vec<LedgerEntry>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            artifacts: BTreeMap::new(),
        }
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ledger, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(LedgerError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let ledger: Ledger =
            serde_json::from_str(&contents).map_err(|source| LedgerError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        if ledger.version != LEDGER_VERSION {
            return Err(LedgerError::Version {
                path: path.to_path_buf(),
                found: ledger.version,
            });
        }
        Ok(ledger)
    }

    /// Write the ledger atomically, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let write_err = |source| LedgerError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut json = serde_json::to_string_pretty(self).map_err(|source| LedgerError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        json.push('\n');
        atomic_write(path, json.as_bytes()).map_err(write_err)
    }

    pub fn lookup(&self, artifact: &str, set: &str, step: &str) -> Option<&LedgerEntry> {
        self.artifacts
            .get(artifact)?
            .iter()
            .find(|entry| entry.set == set && entry.step == step)
    }

    /// Record that `step` of `set` inserted `replacement` into `artifact`.
    /// Re-recording a step replaces its previous entry.
    pub fn record(&mut self, artifact: &str, set: &str, step: &str, replacement: &str) {
        let entries = self.artifacts.entry(artifact.to_string()).or_default();
        let entry = LedgerEntry {
            set: set.to_string(),
            step: step.to_string(),
            fingerprint: fingerprint(replacement),
        };
        match entries
            .iter_mut()
            .find(|existing| existing.set == set && existing.step == step)
        {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    /// Drop an entry; returns whether one existed.
    pub fn forget(&mut self, artifact: &str, set: &str, step: &str) -> bool {
        let Some(entries) = self.artifacts.get_mut(artifact) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| !(entry.set == set && entry.step == step));
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.artifacts.remove(artifact);
        }
        removed
    }

    pub fn entries(&self, artifact: &str) -> &[LedgerEntry] {
        self.artifacts
            .get(artifact)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Fingerprint of a replacement text as stored in the ledger.
pub fn fingerprint(text: &str) -> String {
    format!("{:016x}", xxh3_64(text.as_bytes()))
}
