//! Replacement templates.
//!
//! A template is literal text with optional `%{name}` references to
//! variables bound by the patch set. Nothing is captured from the match:
//! the rendered replacement depends only on the template and the variables,
//! which is what lets a guard test for it before anything is replaced.
//!
//! `%%{` produces a literal `%{`. Any other `%` is plain text, so CSS
//! percentages and JS template literals (`${API_URL}`) pass through.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated '%{{' at byte {offset}")]
    Unterminated { offset: usize },

    #[error("invalid variable name '{name}' at byte {offset}")]
    InvalidName { name: String, offset: usize },

    #[error("undefined variable '{name}'")]
    Undefined { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(String),
}

/// A parsed replacement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(idx) = rest.find('%') {
            text.push_str(&rest[..idx]);
            let at = &rest[idx..];

            if at.starts_with("%%{") {
                text.push_str("%{");
                offset += idx + 3;
                rest = &at[3..];
            } else if at.starts_with("%{") {
                let close = at
                    .find('}')
                    .ok_or(TemplateError::Unterminated { offset: offset + idx })?;
                let name = &at[2..close];
                if !is_identifier(name) {
                    return Err(TemplateError::InvalidName {
                        name: name.to_string(),
                        offset: offset + idx,
                    });
                }
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Var(name.to_string()));
                offset += idx + close + 1;
                rest = &at[close + 1..];
            } else {
                text.push('%');
                offset += idx + 1;
                rest = &at[1..];
            }
        }
        text.push_str(rest);
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self { segments })
    }

    /// Render against `vars`. Every referenced variable must be bound.
    pub fn render(&self, vars: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Var(name) => {
                    let value = vars.get(name).ok_or_else(|| TemplateError::Undefined {
                        name: name.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Names of every variable the template references, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Var(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
