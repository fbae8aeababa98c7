//! The atomic unit of change: find a span, replace it, once.

use crate::edit::{Edit, EditError};
use crate::guard::{Guard, GuardContext, SkipReason};
use crate::pattern::{Pattern, PatternError};
use crate::template::{Template, TemplateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// How many matches a step rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only the first match in document order.
    First,
    /// Every non-overlapping match in document order.
    All,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::First => write!(f, "first"),
            Scope::All => write!(f, "all"),
        }
    }
}

/// What happened when a step ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
#[must_use = "StepOutcome should be reported"]
pub enum StepOutcome {
    /// The step rewrote `replacements` spans.
    Applied { replacements: usize },
    /// The step's effect is already in the artifact.
    AlreadyPresent { reason: SkipReason },
    /// Neither the target nor the step's effect could be found.
    NotFound,
}

impl StepOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, StepOutcome::Applied { .. })
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Applied { replacements: 1 } => write!(f, "applied"),
            StepOutcome::Applied { replacements } => {
                write!(f, "applied ({replacements} replacements)")
            }
            StepOutcome::AlreadyPresent { reason } => write!(f, "already present ({reason})"),
            StepOutcome::NotFound => write!(f, "target not found"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error("step id must not be empty")]
    EmptyId,

    #[error("step '{id}': invalid pattern: {source}")]
    Pattern { id: String, source: PatternError },

    #[error("step '{id}': invalid replacement: {source}")]
    Template { id: String, source: TemplateError },

    #[error("step '{id}': {source}")]
    Edit { id: String, source: EditError },
}

/// A pattern, a guard and a replacement.
///
/// Steps are immutable once built and never mutate the text they are given.
/// With [`Scope::All`], a replacement that contains its own pattern is only
/// idempotent under a marker guard or the ledger; the default guard would
/// match the inserted text again on the next run. A step whose pattern
/// matches nothing reports [`StepOutcome::NotFound`] unless the ledger or an
/// opt-in replacement probe says it already happened.
#[derive(Debug, Clone)]
pub struct PatchStep {
    id: String,
    pattern: Pattern,
    guard: Guard,
    replacement: String,
    scope: Scope,
}

impl PatchStep {
    pub fn new(
        id: impl Into<String>,
        pattern: Pattern,
        replacement: impl Into<String>,
        scope: Scope,
    ) -> Result<Self, StepError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(StepError::EmptyId);
        }
        Ok(Self {
            id,
            pattern,
            guard: Guard::none(),
            replacement: replacement.into(),
            scope,
        })
    }

    /// Exact-text step rewriting the first match.
    pub fn literal(
        id: impl Into<String>,
        find: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Result<Self, StepError> {
        let id = id.into();
        let pattern = Pattern::literal(find).map_err(|source| StepError::Pattern {
            id: id.clone(),
            source,
        })?;
        Self::new(id, pattern, replacement, Scope::First)
    }

    /// Structural-pattern step rewriting the first match.
    pub fn structural(
        id: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, StepError> {
        let id = id.into();
        let pattern = Pattern::structural(pattern).map_err(|source| StepError::Pattern {
            id: id.clone(),
            source,
        })?;
        Self::new(id, pattern, replacement, Scope::First)
    }

    /// Build a step whose replacement is rendered from a template.
    pub fn from_template(
        id: impl Into<String>,
        pattern: Pattern,
        template: &Template,
        vars: &BTreeMap<String, String>,
        scope: Scope,
    ) -> Result<Self, StepError> {
        let id = id.into();
        let replacement = template
            .render(vars)
            .map_err(|source| StepError::Template {
                id: id.clone(),
                source,
            })?;
        Self::new(id, pattern, replacement, scope)
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    /// Skip the step while `marker` occurs in the artifact.
    pub fn unless_present(mut self, marker: impl Into<String>) -> Self {
        self.guard = self.guard.with_marker(marker);
        self
    }

    /// Count the step as applied when its pattern is gone and its
    /// replacement occurs in the artifact. See [`Guard::with_replacement_probe`].
    pub fn skip_if_replacement_present(mut self) -> Self {
        self.guard = self.guard.with_replacement_probe();
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Whether running this step against `text` would change it.
    pub fn should_apply(&self, ctx: &GuardContext<'_>, text: &str) -> bool {
        self.guard
            .check(ctx, &self.id, text, &self.replacement)
            .is_none()
            && self.pattern.find(text).is_some()
    }

    /// Run the step against `text`, returning the resulting text and what happened.
    ///
    /// A missing target is an outcome, not an error. Errors only arise if a
    /// computed edit fails verification, which indicates a matcher bug.
    pub fn apply(
        &self,
        ctx: &GuardContext<'_>,
        text: &str,
    ) -> Result<(String, StepOutcome), StepError> {
        if let Some(reason) = self.guard.check(ctx, &self.id, text, &self.replacement) {
            tracing::debug!(step = %self.id, %reason, "guard skipped step");
            return Ok((text.to_string(), StepOutcome::AlreadyPresent { reason }));
        }

        let spans = match self.scope {
            Scope::First => self.pattern.find(text).into_iter().collect::<Vec<_>>(),
            Scope::All => self.pattern.find_all(text),
        };

        if spans.is_empty() {
            let outcome = match self
                .guard
                .check_unmatched(ctx, &self.id, text, &self.replacement)
            {
                Some(reason) => StepOutcome::AlreadyPresent { reason },
                None => StepOutcome::NotFound,
            };
            tracing::debug!(step = %self.id, %outcome, "pattern matched nothing");
            return Ok((text.to_string(), outcome));
        }

        if ctx.is_recorded(&self.id, &self.replacement) {
            tracing::warn!(
                set = ctx.set,
                step = %self.id,
                artifact = ctx.artifact,
                "ledger records this step but its target is back; applying again"
            );
        }

        tracing::debug!(
            step = %self.id,
            matches = spans.len(),
            scope = %self.scope,
            "pattern matched"
        );

        let edits: Vec<Edit> = spans
            .iter()
            .map(|span| {
                let current = span.slice(text).unwrap_or_default();
                Edit::new(*span, self.replacement.clone(), current)
            })
            .collect();

        let patched = Edit::splice_all(text, &edits).map_err(|source| StepError::Edit {
            id: self.id.clone(),
            source,
        })?;

        Ok((
            patched,
            StepOutcome::Applied {
                replacements: edits.len(),
            },
        ))
    }
}
