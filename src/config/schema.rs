use crate::step::Scope;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// One patch-set file as authored on disk.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchSetFile {
    #[serde(default)]
    pub meta: Metadata,
    /// Free variables for replacement templates.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl PatchSetFile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.meta.name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                step_id: None,
                field: "meta.name",
            });
        }

        if self.steps.is_empty() {
            issues.push(ValidationIssue::EmptyStepList);
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            let step_id = if step.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    step_id: None,
                    field: "id",
                });
                None
            } else {
                if !seen.insert(step.id.as_str()) {
                    issues.push(ValidationIssue::DuplicateStep {
                        step_id: step.id.clone(),
                    });
                }
                Some(step.id.clone())
            };

            if self.artifact_for(step).is_none() {
                issues.push(ValidationIssue::MissingField {
                    step_id: step_id.clone(),
                    field: "artifact",
                });
            }

            if step.scope.is_none() {
                issues.push(ValidationIssue::MissingField {
                    step_id: step_id.clone(),
                    field: "scope",
                });
            }

            if step.pattern.text().trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    step_id: step_id.clone(),
                    field: "pattern.text",
                });
            }

            if let Some(guard) = &step.guard {
                let empty_marker = guard.absent.as_deref() == Some("");
                let checks_nothing = guard.absent.is_none() && !guard.replacement_present;
                if empty_marker || checks_nothing {
                    issues.push(ValidationIssue::MissingField {
                        step_id: step_id.clone(),
                        field: "guard.absent",
                    });
                }
            }

            if let PatternDefinition::Literal { text } = &step.pattern {
                if *text == step.replace.text {
                    issues.push(ValidationIssue::InvalidCombo {
                        step_id: step_id.clone(),
                        message: "replacement is identical to the pattern".to_string(),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// The artifact a step targets: its own override, else the file default.
    pub fn artifact_for<'a>(&'a self, step: &'a StepDefinition) -> Option<&'a str> {
        step.artifact
            .as_deref()
            .or(self.meta.artifact.as_deref())
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    /// Ledger namespace for every set compiled from this file.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Default artifact key for steps that do not name one.
    #[serde(default)]
    pub artifact: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StepDefinition {
    pub id: String,
    #[serde(default)]
    pub artifact: Option<String>,
    /// Required; kept optional here so a missing scope is reported as a
    /// validation issue alongside everything else.
    #[serde(default)]
    pub scope: Option<Scope>,
    pub pattern: PatternDefinition,
    #[serde(default)]
    pub guard: Option<GuardDefinition>,
    pub replace: ReplaceDefinition,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PatternDefinition {
    /// Byte-exact search text.
    Literal { text: String },
    /// Whitespace-tolerant pattern with `{...}` wildcards.
    Structural { text: String },
}

impl PatternDefinition {
    pub fn text(&self) -> &str {
        match self {
            PatternDefinition::Literal { text } | PatternDefinition::Structural { text } => text,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardDefinition {
    /// Skip the step whenever this text occurs in the artifact.
    #[serde(default)]
    pub absent: Option<String>,
    /// Count the step as applied when its pattern is gone and its
    /// replacement occurs anywhere in the artifact.
    #[serde(default)]
    pub replacement_present: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplaceDefinition {
    /// Replacement template; `%{name}` refers to `[vars]`.
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyStepList,
    MissingField {
        step_id: Option<String>,
        field: &'static str,
    },
    DuplicateStep {
        step_id: String,
    },
    InvalidCombo {
        step_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyStepList => write!(f, "patch set contains no steps"),
            ValidationIssue::MissingField { step_id, field } => match step_id {
                Some(id) => write!(f, "step '{id}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::DuplicateStep { step_id } => {
                write!(f, "step id '{step_id}' is declared more than once")
            }
            ValidationIssue::InvalidCombo { step_id, message } => match step_id {
                Some(id) => write!(f, "step '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch set configuration: {message}"),
            },
        }
    }
}
