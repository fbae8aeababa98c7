//! Drives compiled patch sets against a store: load, run, save, record.
//!
//! A [`Runner`] owns the in-memory ledger for one invocation. In dry-run
//! mode nothing is written; patched artifacts are kept in an overlay so a
//! later set touching the same artifact sees what an actual run would have
//! produced.

use crate::config::TargetedSet;
use crate::ledger::{Ledger, LedgerError};
use crate::pattern::{closest_line, NearMiss};
use crate::set::{RunError, RunReport};
use crate::step::PatchStep;
use crate::store::{Artifact, ArtifactStore, StoreError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("patch set '{set}': cannot load {artifact}: {source}")]
    Load {
        set: String,
        artifact: String,
        source: StoreError,
    },

    #[error("patch set '{set}': cannot save {artifact}: {source}")]
    Save {
        set: String,
        artifact: String,
        source: StoreError,
    },

    #[error(transparent)]
    Run(Box<RunError>),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("failed to scan {dir} for patch sets: {source}")]
    Discover {
        dir: PathBuf,
        source: walkdir::Error,
    },
}

/// What one set did to its artifact.
#[derive(Debug, Clone)]
pub struct SetRun {
    /// The artifact as loaded, before the set ran.
    pub before: Artifact,
    pub report: RunReport,
}

impl SetRun {
    pub fn after(&self) -> &Artifact {
        self.report.output()
    }
}

pub struct Runner<'s, S: ArtifactStore + ?Sized> {
    store: &'s S,
    ledger: Option<Ledger>,
    ledger_path: Option<PathBuf>,
    dry_run: bool,
    overlay: HashMap<String, Artifact>,
}

impl<'s, S: ArtifactStore + ?Sized> Runner<'s, S> {
    /// A runner without a ledger.
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            ledger: None,
            ledger_path: None,
            dry_run: false,
            overlay: HashMap::new(),
        }
    }

    /// Load the ledger at `path` (missing file = empty) and save it back on
    /// [`Runner::finish`].
    pub fn with_ledger_file(mut self, path: impl Into<PathBuf>) -> Result<Self, RunnerError> {
        let path = path.into();
        self.ledger = Some(Ledger::load(&path)?);
        self.ledger_path = Some(path);
        Ok(self)
    }

    /// Use an in-memory ledger that is never persisted.
    pub fn with_ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn ledger(&self) -> Option<&Ledger> {
        self.ledger.as_ref()
    }

    /// Run one set against its artifact and persist the result.
    ///
    /// When a step fails mid-set, the steps that completed are still saved
    /// and recorded before the error is returned.
    pub fn apply(&mut self, target: &TargetedSet) -> Result<SetRun, RunnerError> {
        let before = self.load(target.set.name(), &target.artifact)?;
        let result = target.set.run(&before, self.ledger.as_ref());
        self.settle(target, before, result)
    }

    /// Save and record whatever a run produced, complete or partial.
    fn settle(
        &mut self,
        target: &TargetedSet,
        before: Artifact,
        result: Result<RunReport, RunError>,
    ) -> Result<SetRun, RunnerError> {
        let set = &target.set;
        match result {
            Ok(report) => {
                if report.changed {
                    self.persist(set.name(), report.output())?;
                }
                self.record(target, report.applied().map(|r| r.id.as_str()));
                Ok(SetRun { before, report })
            }
            Err(err) => {
                if err.partial.text() != before.text() {
                    tracing::warn!(
                        set = %err.set,
                        step = %err.step,
                        artifact = %target.artifact,
                        completed = err.completed.len(),
                        "saving partially patched artifact"
                    );
                    self.persist(set.name(), &err.partial)?;
                }
                self.record(
                    target,
                    err.completed
                        .iter()
                        .filter(|r| r.outcome.is_applied())
                        .map(|r| r.id.as_str()),
                );
                Err(RunnerError::Run(Box::new(err)))
            }
        }
    }

    /// Persist the ledger if one was loaded from a file and this is not a
    /// dry run. Returns the final ledger.
    pub fn finish(self) -> Result<Option<Ledger>, RunnerError> {
        if let (Some(ledger), Some(path), false) = (&self.ledger, &self.ledger_path, self.dry_run)
        {
            ledger.save(path)?;
            tracing::debug!(path = %path.display(), "saved ledger");
        }
        Ok(self.ledger)
    }

    fn load(&self, set: &str, key: &str) -> Result<Artifact, RunnerError> {
        if let Some(pending) = self.overlay.get(key) {
            return Ok(pending.clone());
        }
        self.store.load(key).map_err(|source| RunnerError::Load {
            set: set.to_string(),
            artifact: key.to_string(),
            source,
        })
    }

    fn persist(&mut self, set: &str, artifact: &Artifact) -> Result<(), RunnerError> {
        if self.dry_run {
            self.overlay
                .insert(artifact.key().to_string(), artifact.clone());
            return Ok(());
        }
        self.store.save(artifact).map_err(|source| RunnerError::Save {
            set: set.to_string(),
            artifact: artifact.key().to_string(),
            source,
        })
    }

    fn record<'a>(&mut self, target: &TargetedSet, applied: impl Iterator<Item = &'a str>) {
        let Some(ledger) = self.ledger.as_mut() else {
            return;
        };
        for id in applied {
            if let Some(step) = target.set.steps().iter().find(|step| step.id() == id) {
                ledger.record(&target.artifact, target.set.name(), id, step.replacement());
            }
        }
    }
}

/// Closest line in `text` to what `step` was looking for.
pub fn near_miss(step: &PatchStep, text: &str) -> Option<NearMiss> {
    closest_line(text, &step.pattern().anchor_text())
}

/// Patch-set files directly inside `dir`, sorted by name.
///
/// A missing directory yields no files.
pub fn discover_patch_files(dir: &Path) -> Result<Vec<PathBuf>, RunnerError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| RunnerError::Discover {
            dir: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
        {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}
