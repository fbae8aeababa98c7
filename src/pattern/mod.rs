//! Text pattern matching for patch steps.
//!
//! Two modes are supported:
//!
//! - **Literal**: byte-exact substring search.
//! - **Structural**: a small pattern language that tolerates whitespace drift
//!   and skips over arbitrary text with non-greedy wildcards.
//!
//! # Structural syntax
//!
//! | Source      | Meaning                                              |
//! |-------------|------------------------------------------------------|
//! | `{...}`     | shortest run of any characters, newlines included    |
//! | whitespace  | any run of whitespace, including none                |
//! | `\{` `\}`   | literal braces                                       |
//! | `\[` `\]`   | literal brackets (unescaped brackets are literal too) |
//! | `\\`        | literal backslash                                    |
//!
//! Every other character matches itself. Leading and trailing whitespace in
//! a structural pattern is ignored.
//!
//! ```
//! use text_patcher::pattern::Pattern;
//!
//! let pattern = Pattern::structural(r#"<div style=\{\{ flex: 1 \}\}>{...}</div>"#).unwrap();
//! let text = "<div style={{flex: 1}}>\n  <span/>\n</div>";
//! assert!(pattern.find(text).is_some());
//! ```

pub mod errors;
pub mod matcher;
pub mod near_miss;
pub mod syntax;

pub use errors::PatternError;
pub use matcher::StructuralPattern;
pub use near_miss::{closest_line, NearMiss};
pub use syntax::Token;

use crate::edit::Span;

/// A compiled pattern, ready to search artifacts.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Structural(StructuralPattern),
}

impl Pattern {
    /// Exact substring pattern. Empty text is rejected since it matches everywhere.
    pub fn literal(text: impl Into<String>) -> Result<Self, PatternError> {
        let text = text.into();
        if text.is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(Pattern::Literal(text))
    }

    /// Parse and compile a structural pattern.
    pub fn structural(source: &str) -> Result<Self, PatternError> {
        StructuralPattern::compile(source).map(Pattern::Structural)
    }

    /// First match in document order.
    pub fn find(&self, text: &str) -> Option<Span> {
        match self {
            Pattern::Literal(needle) => text
                .find(needle.as_str())
                .map(|start| Span::new(start, start + needle.len())),
            Pattern::Structural(pattern) => pattern.find(text),
        }
    }

    /// Every non-overlapping match in document order.
    pub fn find_all(&self, text: &str) -> Vec<Span> {
        match self {
            Pattern::Literal(needle) => text
                .match_indices(needle.as_str())
                .map(|(start, m)| Span::new(start, start + m.len()))
                .collect(),
            Pattern::Structural(pattern) => pattern.find_all(text),
        }
    }

    /// The pattern as the author wrote it.
    pub fn source(&self) -> &str {
        match self {
            Pattern::Literal(text) => text,
            Pattern::Structural(pattern) => pattern.source(),
        }
    }

    /// Longest fixed fragment of the pattern, used to point at near misses.
    pub fn anchor_text(&self) -> String {
        match self {
            Pattern::Literal(text) => text
                .lines()
                .map(str::trim)
                .max_by_key(|line| line.len())
                .unwrap_or_default()
                .to_string(),
            Pattern::Structural(pattern) => pattern.anchor_text(),
        }
    }
}
