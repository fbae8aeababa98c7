//! Ordered patch sets and their run reports.

use crate::guard::GuardContext;
use crate::ledger::Ledger;
use crate::step::{PatchStep, StepError, StepOutcome};
use crate::store::Artifact;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("patch set name must not be empty")]
    EmptyName,

    #[error("patch set '{set}' declares step '{id}' more than once")]
    DuplicateStep { set: String, id: String },

    #[error(transparent)]
    Step(#[from] StepError),
}

/// A step failed in a way that is not a plain no-match.
///
/// Sets are not transactional: `partial` holds the artifact as it stood after
/// the last completed step and `completed` their outcomes, so the caller can
/// persist and report what did happen.
#[derive(Error, Debug)]
#[error("patch set '{set}' stopped at step '{step}': {source}")]
pub struct RunError {
    pub set: String,
    pub step: String,
    pub completed: Vec<StepReport>,
    pub partial: Artifact,
    #[source]
    pub source: StepError,
}

/// Outcome of one step within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub id: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Aggregated result of running a set against one artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub set: String,
    pub artifact: String,
    pub changed: bool,
    pub steps: Vec<StepReport>,
    #[serde(skip)]
    output: Artifact,
}

impl RunReport {
    /// The artifact after every step ran.
    pub fn output(&self) -> &Artifact {
        &self.output
    }

    pub fn into_output(self) -> Artifact {
        self.output
    }

    pub fn applied(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|report| report.outcome.is_applied())
    }

    pub fn not_found(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|report| report.outcome == StepOutcome::NotFound)
    }

    /// Every step's effect was already in the input.
    pub fn is_fully_present(&self) -> bool {
        self.steps
            .iter()
            .all(|report| matches!(report.outcome, StepOutcome::AlreadyPresent { .. }))
    }
}

/// One migration intent: named, ordered steps against a single artifact.
#[derive(Debug, Clone)]
pub struct PatchSet {
    name: String,
    steps: Vec<PatchStep>,
}

impl PatchSet {
    pub fn new(name: impl Into<String>, steps: Vec<PatchStep>) -> Result<Self, BuildError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BuildError::EmptyName);
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id()) {
                return Err(BuildError::DuplicateStep {
                    set: name.clone(),
                    id: step.id().to_string(),
                });
            }
        }

        Ok(Self { name, steps })
    }

    pub fn builder(name: impl Into<String>) -> PatchSetBuilder {
        PatchSetBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[PatchStep] {
        &self.steps
    }

    /// Run every step in declared order against `artifact`.
    ///
    /// Step *i+1* sees the output of step *i*. A step that finds nothing is
    /// reported and the run moves on. The input artifact is left untouched.
    pub fn run(&self, artifact: &Artifact, ledger: Option<&Ledger>) -> Result<RunReport, RunError> {
        self.run_with(artifact, ledger, |step, ctx, text| step.apply(ctx, text))
    }

    fn run_with<F>(
        &self,
        artifact: &Artifact,
        ledger: Option<&Ledger>,
        apply: F,
    ) -> Result<RunReport, RunError>
    where
        F: Fn(&PatchStep, &GuardContext<'_>, &str) -> Result<(String, StepOutcome), StepError>,
    {
        let ctx = GuardContext::new(&self.name, artifact.key()).with_ledger(ledger);
        let mut text = artifact.text().to_string();
        let mut steps = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            match apply(step, &ctx, &text) {
                Ok((next, outcome)) => {
                    if outcome.is_applied() {
                        tracing::info!(
                            set = %self.name,
                            step = step.id(),
                            artifact = artifact.key(),
                            %outcome,
                            "step applied"
                        );
                    }
                    text = next;
                    steps.push(StepReport {
                        id: step.id().to_string(),
                        outcome,
                    });
                }
                Err(source) => {
                    return Err(RunError {
                        set: self.name.clone(),
                        step: step.id().to_string(),
                        completed: steps,
                        partial: artifact.with_text(text),
                        source,
                    });
                }
            }
        }

        Ok(RunReport {
            set: self.name.clone(),
            artifact: artifact.key().to_string(),
            changed: text != artifact.text(),
            steps,
            output: artifact.with_text(text),
        })
    }
}

pub struct PatchSetBuilder {
    name: String,
    steps: Vec<PatchStep>,
}

impl PatchSetBuilder {
    pub fn step(mut self, step: PatchStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> Result<PatchSet, BuildError> {
        PatchSet::new(self.name, self.steps)
    }
}
