//! Idempotency guards.
//!
//! A guard runs strictly before a step's pattern is searched. Checks run
//! from most to least authoritative:
//!
//! 1. the ledger says this step already ran and its replacement is still there
//! 2. the step's marker text is present
//! 3. otherwise the step applies wherever its pattern matches
//!
//! When the pattern then matches nothing, [`Guard::check_unmatched`] decides
//! between "already applied" and "not found". Only the ledger and an
//! explicit opt-in may claim the former.

use crate::ledger::{fingerprint, Ledger, LedgerEntry};
use serde::Serialize;
use std::fmt;

/// Where a step runs: which set, which artifact, which ledger.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub set: &'a str,
    pub artifact: &'a str,
    pub ledger: Option<&'a Ledger>,
}

impl<'a> GuardContext<'a> {
    pub fn new(set: &'a str, artifact: &'a str) -> Self {
        Self {
            set,
            artifact,
            ledger: None,
        }
    }

    pub fn with_ledger(mut self, ledger: Option<&'a Ledger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn ledger_entry(&self, step: &str) -> Option<&'a LedgerEntry> {
        self.ledger
            .and_then(|ledger| ledger.lookup(self.artifact, self.set, step))
    }

    /// The ledger records `step` in this set and artifact with exactly this
    /// replacement.
    pub fn is_recorded(&self, step: &str, replacement: &str) -> bool {
        self.ledger_entry(step)
            .is_some_and(|entry| entry.fingerprint == fingerprint(replacement))
    }
}

/// Why a step was skipped as already present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum SkipReason {
    /// The ledger records this step and the text does not contradict it.
    Ledger,
    /// The step's marker text is present.
    Marker(String),
    /// The pattern is gone, the replacement is in the text and the step
    /// opted into treating that as applied.
    ReplacementPresent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Ledger => write!(f, "recorded in ledger"),
            SkipReason::Marker(marker) => write!(f, "marker {marker:?} present"),
            SkipReason::ReplacementPresent => write!(f, "replacement already present"),
        }
    }
}

/// Pre-match checks attached to a step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guard {
    marker: Option<String>,
    replacement_probe: bool,
}

impl Guard {
    /// Default guard: apply wherever the pattern matches.
    pub fn none() -> Self {
        Self::default()
    }

    /// Skip the step whenever `marker` occurs anywhere in the artifact,
    /// even if the pattern would still match elsewhere.
    pub fn unless_present(marker: impl Into<String>) -> Self {
        Self::none().with_marker(marker)
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// When the pattern matches nothing, count the step as applied if its
    /// replacement occurs anywhere in the artifact.
    ///
    /// The probe is unanchored: a replacement that also appears for
    /// unrelated reasons hides a drifted target, and an empty replacement
    /// is always found. Prefer a marker or the ledger.
    pub fn with_replacement_probe(mut self) -> Self {
        self.replacement_probe = true;
        self
    }

    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    pub fn probes_replacement(&self) -> bool {
        self.replacement_probe
    }

    /// Returns the reason to skip, or `None` when matching should proceed.
    pub fn check(
        &self,
        ctx: &GuardContext<'_>,
        step: &str,
        text: &str,
        replacement: &str,
    ) -> Option<SkipReason> {
        if let Some(entry) = ctx.ledger_entry(step) {
            if entry.fingerprint != fingerprint(replacement) {
                tracing::warn!(
                    set = ctx.set,
                    step,
                    artifact = ctx.artifact,
                    "ledger entry was recorded for a different replacement; ignoring it"
                );
            } else if !replacement.is_empty() && text.contains(replacement) {
                return Some(SkipReason::Ledger);
            } else {
                tracing::debug!(
                    set = ctx.set,
                    step,
                    artifact = ctx.artifact,
                    "ledger entry not confirmed by the text; matching the pattern"
                );
            }
        }

        if let Some(marker) = &self.marker {
            if text.contains(marker.as_str()) {
                return Some(SkipReason::Marker(marker.clone()));
            }
        }

        None
    }

    /// Classify a step whose pattern matched nothing.
    ///
    /// A recorded step whose target is gone has happened, even if a later
    /// step rewrote what it inserted. Without a ledger entry, only the
    /// opt-in replacement probe can claim the step; otherwise the target
    /// is reported missing.
    pub fn check_unmatched(
        &self,
        ctx: &GuardContext<'_>,
        step: &str,
        text: &str,
        replacement: &str,
    ) -> Option<SkipReason> {
        if ctx.is_recorded(step, replacement) {
            return Some(SkipReason::Ledger);
        }
        if self.replacement_probe && text.contains(replacement) {
            return Some(SkipReason::ReplacementPresent);
        }
        None
    }
}
