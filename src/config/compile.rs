//! Turning a validated patch-set file into runnable patch sets.

use crate::config::loader::ConfigError;
use crate::config::schema::{PatchSetFile, PatternDefinition, StepDefinition, ValidationError, ValidationIssue};
use crate::pattern::Pattern;
use crate::set::{BuildError, PatchSet};
use crate::step::{PatchStep, Scope, StepError};
use crate::template::Template;
use std::collections::BTreeMap;

/// A patch set and the artifact it runs against.
#[derive(Debug, Clone)]
pub struct TargetedSet {
    pub artifact: String,
    pub set: PatchSet,
}

/// Build one patch set per artifact named in `file`.
///
/// Steps keep their declared order within each artifact; artifacts appear in
/// the order they are first mentioned. `overrides` take precedence over the
/// file's `[vars]`.
pub fn compile(
    file: &PatchSetFile,
    overrides: &BTreeMap<String, String>,
) -> Result<Vec<TargetedSet>, ConfigError> {
    file.validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;

    let mut vars = file.vars.clone();
    vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut grouped: Vec<(String, Vec<PatchStep>)> = Vec::new();
    for definition in &file.steps {
        let artifact = required(file.artifact_for(definition), definition, "artifact")?;
        let scope = required(definition.scope, definition, "scope")?;
        let step = compile_step(definition, scope, &vars).map_err(|source| {
            ConfigError::Compile {
                path: None,
                source: BuildError::Step(source),
            }
        })?;

        match grouped.iter_mut().find(|(key, _)| key == artifact) {
            Some((_, steps)) => steps.push(step),
            None => grouped.push((artifact.to_string(), vec![step])),
        }
    }

    grouped
        .into_iter()
        .map(|(artifact, steps)| {
            let set = PatchSet::new(file.meta.name.clone(), steps)
                .map_err(|source| ConfigError::Compile { path: None, source })?;
            Ok(TargetedSet { artifact, set })
        })
        .collect()
}

fn compile_step(
    definition: &StepDefinition,
    scope: Scope,
    vars: &BTreeMap<String, String>,
) -> Result<PatchStep, StepError> {
    let id = definition.id.as_str();
    let pattern = match &definition.pattern {
        PatternDefinition::Literal { text } => Pattern::literal(text.clone()),
        PatternDefinition::Structural { text } => Pattern::structural(text),
    }
    .map_err(|source| StepError::Pattern {
        id: id.to_string(),
        source,
    })?;

    let template = parse_template(id, &definition.replace.text)?;
    let step = PatchStep::from_template(id, pattern, &template, vars, scope)?;

    let Some(guard) = &definition.guard else {
        return Ok(step);
    };
    let step = match &guard.absent {
        Some(absent) => {
            let marker = parse_template(id, absent)?
                .render(vars)
                .map_err(|source| StepError::Template {
                    id: id.to_string(),
                    source,
                })?;
            step.unless_present(marker)
        }
        None => step,
    };
    Ok(if guard.replacement_present {
        step.skip_if_replacement_present()
    } else {
        step
    })
}

fn parse_template(id: &str, source: &str) -> Result<Template, StepError> {
    Template::parse(source).map_err(|source| StepError::Template {
        id: id.to_string(),
        source,
    })
}

fn required<T>(
    value: Option<T>,
    definition: &StepDefinition,
    field: &'static str,
) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::Validation {
        path: None,
        source: ValidationError {
            issues: vec![ValidationIssue::MissingField {
                step_id: Some(definition.id.clone()),
                field,
            }],
        },
    })
}
