use crate::cache;
use crate::edit::Span;
use crate::pattern::errors::PatternError;
use crate::pattern::syntax::{tokenize, Token};
use regex::Regex;

/// A structural pattern compiled to a regular expression.
///
/// Tokens map onto regex fragments one-to-one:
///
/// - literal and escaped text: `regex::escape`
/// - whitespace: `\s*`
/// - wildcard: `(?s:.*?)`, lazy so the first, shortest match wins
#[derive(Debug, Clone)]
pub struct StructuralPattern {
    source: String,
    tokens: Vec<Token>,
    regex: Regex,
}

impl StructuralPattern {
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let tokens = tokenize(source)?;
        let regex_source = to_regex_source(&tokens);
        let regex = cache::get_or_compile(&regex_source).map_err(|e| PatternError::Compile {
            message: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            tokens,
            regex,
        })
    }

    pub fn find(&self, text: &str) -> Option<Span> {
        self.regex.find(text).map(|m| Span::new(m.start(), m.end()))
    }

    pub fn find_all(&self, text: &str) -> Vec<Span> {
        self.regex
            .find_iter(text)
            .map(|m| Span::new(m.start(), m.end()))
            .collect()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn has_wildcard(&self) -> bool {
        self.tokens.contains(&Token::Wildcard)
    }

    /// Longest run of fixed text between whitespace and wildcards.
    pub fn anchor_text(&self) -> String {
        let mut best = String::new();
        let mut current = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => current.push_str(text),
                Token::Escaped(ch) => current.push(*ch),
                // Keep words joined by whitespace together; lines in the
                // artifact will carry some whitespace there too.
                Token::Whitespace => current.push(' '),
                Token::Wildcard => {
                    if current.trim().len() > best.len() {
                        best = current.trim().to_string();
                    }
                    current.clear();
                }
            }
        }
        if current.trim().len() > best.len() {
            best = current.trim().to_string();
        }
        best
    }
}

fn to_regex_source(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Literal(text) => out.push_str(&regex::escape(text)),
            Token::Escaped(ch) => out.push_str(&regex::escape(&ch.to_string())),
            Token::Whitespace => out.push_str(r"\s*"),
            Token::Wildcard => out.push_str("(?s:.*?)"),
        }
    }
    out
}
