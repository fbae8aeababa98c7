use thiserror::Error;

/// Authoring errors in a pattern. These are fatal: a set containing a
/// malformed pattern never runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("dangling '\\' at byte {offset}")]
    TrailingEscape { offset: usize },

    #[error("unknown escape '\\{ch}' at byte {offset}")]
    UnknownEscape { ch: char, offset: usize },

    #[error("unescaped '{{' at byte {offset}; write '\\{{' for a literal brace or '{{...}}' for a wildcard")]
    UnbalancedOpen { offset: usize },

    #[error("unescaped '}}' at byte {offset}; write '\\}}' for a literal brace")]
    UnbalancedClose { offset: usize },

    #[error("wildcard at the {edge} of the pattern matches nothing; anchor it with literal text")]
    UnanchoredWildcard { edge: &'static str },

    #[error("pattern failed to compile: {message}")]
    Compile { message: String },
}
