use std::fmt;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Half-open byte range `[start, end)` into an artifact's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Slice `text` at this span, or `None` if out of range or off a char boundary.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Every patch step compiles down to one or more of these. The matcher finds
/// the span, the edit records what it expects to find there, and splicing
/// refuses to proceed if the text has shifted underneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until splice() is called"]
pub struct Edit {
    pub span: Span,
    /// New text to insert at the span
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (cheaper to hold for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("before-text verification failed at {span}: found {found:?}")]
    BeforeTextMismatch { span: Span, found: String },

    #[error("invalid byte range {span} in text of length {len}")]
    InvalidByteRange { span: Span, len: usize },

    #[error("edits overlap at {first} and {second}")]
    Overlapping { first: Span, second: Span },
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(span: Span, new_text: impl Into<String>, expected_before: &str) -> Self {
        Self {
            span,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before),
        }
    }

    /// Validate the edit against `text`, returning the current text at the span.
    fn validate<'a>(&self, text: &'a str) -> Result<&'a str, EditError> {
        if self.span.start > self.span.end || self.span.end > text.len() {
            return Err(EditError::InvalidByteRange {
                span: self.span,
                len: text.len(),
            });
        }

        let current = self.span.slice(text).ok_or(EditError::InvalidByteRange {
            span: self.span,
            len: text.len(),
        })?;

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                span: self.span,
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// Produce a new string with this edit applied. `text` is left untouched.
    pub fn splice(&self, text: &str) -> Result<String, EditError> {
        Self::splice_all(text, std::slice::from_ref(self))
    }

    /// Apply several non-overlapping edits to `text` in one pass.
    ///
    /// Edits may be given in any order; they are applied bottom-to-top so
    /// earlier offsets stay valid.
    pub fn splice_all(text: &str, edits: &[Edit]) -> Result<String, EditError> {
        let mut ordered: Vec<&Edit> = edits.iter().collect();
        ordered.sort_by(|a, b| b.span.start.cmp(&a.span.start));

        for edit in &ordered {
            edit.validate(text)?;
        }

        // Sorted descending: the later edit sits first in each window.
        for window in ordered.windows(2) {
            let (later, earlier) = (window[0], window[1]);
            if earlier.span.end > later.span.start {
                return Err(EditError::Overlapping {
                    first: earlier.span,
                    second: later.span,
                });
            }
        }

        let mut out = text.to_string();
        for edit in ordered {
            out.replace_range(edit.span.start..edit.span.end, &edit.new_text);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::ExactMatch("hello world".to_string());
        assert!(verify.matches("hello world"));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_hash() {
        let verify = EditVerification::Hash(xxh3_64(b"hello world"));
        assert!(verify.matches("hello world"));
        assert!(!verify.matches("goodbye world"));
    }

    #[test]
    fn test_edit_verification_from_text_large() {
        let text = "x".repeat(2000);
        assert!(matches!(
            EditVerification::from_text(&text),
            EditVerification::Hash(_)
        ));
        assert!(matches!(
            EditVerification::from_text("small"),
            EditVerification::ExactMatch(_)
        ));
    }

    #[test]
    fn test_splice_single() {
        let edit = Edit::new(Span::new(0, 8), "modified", "original");
        let out = edit.splice("original content").unwrap();
        assert_eq!(out, "modified content");
    }

    #[test]
    fn test_splice_rejects_invalid_range() {
        let edit = Edit::new(Span::new(5, 20), "replacement", "");
        assert!(matches!(
            edit.splice("hello world"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn test_splice_rejects_inverted_range() {
        let edit = Edit::new(Span { start: 10, end: 5 }, "x", "");
        assert!(matches!(
            edit.splice("hello world"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn test_splice_rejects_mid_char_span() {
        // 'é' is two bytes; offset 1 splits it.
        let edit = Edit::new(Span::new(1, 2), "x", "");
        assert!(matches!(
            edit.splice("é"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn test_splice_detects_mismatch() {
        let edit = Edit::new(Span::new(0, 5), "HELLO", "howdy");
        assert!(matches!(
            edit.splice("hello world"),
            Err(EditError::BeforeTextMismatch { .. })
        ));
    }

    #[test]
    fn test_splice_all_applies_bottom_to_top() {
        let text = "line1\nline2\nline3\n";
        let edits = vec![
            Edit::new(Span::new(0, 5), "LINE1", "line1"),
            Edit::new(Span::new(12, 17), "third line", "line3"),
            Edit::new(Span::new(6, 11), "L2", "line2"),
        ];
        let out = Edit::splice_all(text, &edits).unwrap();
        assert_eq!(out, "LINE1\nL2\nthird line\n");
        assert_eq!(text, "line1\nline2\nline3\n");
    }

    #[test]
    fn test_splice_all_rejects_overlap() {
        let edits = vec![
            Edit::new(Span::new(0, 5), "a", "hello"),
            Edit::new(Span::new(3, 8), "b", "lo wo"),
        ];
        assert!(matches!(
            Edit::splice_all("hello world", &edits),
            Err(EditError::Overlapping { .. })
        ));
    }
}
