//! Tokenizer for the structural pattern language.

use crate::pattern::errors::PatternError;

const WILDCARD: &str = "{...}";

/// One element of a parsed structural pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A run of ordinary characters matched verbatim.
    Literal(String),
    /// A reserved character written with a backslash, matched verbatim.
    Escaped(char),
    /// A run of whitespace in the source; matches any whitespace run.
    Whitespace,
    /// `{...}`: the shortest run of arbitrary text.
    Wildcard,
}

/// Split `source` into tokens.
///
/// Adjacent whitespace runs and adjacent wildcards collapse into one token.
/// Whitespace at either end is dropped so a trailing newline in a TOML
/// string cannot swallow text after the match.
pub fn tokenize(source: &str) -> Result<Vec<Token>, PatternError> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' => {
                let (_, escaped) = chars
                    .next()
                    .ok_or(PatternError::TrailingEscape { offset })?;
                if !matches!(escaped, '{' | '}' | '[' | ']' | '\\') {
                    return Err(PatternError::UnknownEscape {
                        ch: escaped,
                        offset,
                    });
                }
                tokens.push(Token::Escaped(escaped));
            }
            '{' => {
                if !source[offset..].starts_with(WILDCARD) {
                    return Err(PatternError::UnbalancedOpen { offset });
                }
                // Consume the remaining "...}".
                for _ in 1..WILDCARD.len() {
                    chars.next();
                }
                if tokens.last() != Some(&Token::Wildcard) {
                    tokens.push(Token::Wildcard);
                }
            }
            '}' => return Err(PatternError::UnbalancedClose { offset }),
            c if c.is_whitespace() => {
                while chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}
                if tokens.last() != Some(&Token::Whitespace) {
                    tokens.push(Token::Whitespace);
                }
            }
            c => match tokens.last_mut() {
                Some(Token::Literal(run)) => run.push(c),
                _ => tokens.push(Token::Literal(c.to_string())),
            },
        }
    }

    while tokens.first() == Some(&Token::Whitespace) {
        tokens.remove(0);
    }
    while tokens.last() == Some(&Token::Whitespace) {
        tokens.pop();
    }

    validate(&tokens)?;
    Ok(tokens)
}

fn validate(tokens: &[Token]) -> Result<(), PatternError> {
    if tokens.is_empty() {
        return Err(PatternError::Empty);
    }
    if tokens.first() == Some(&Token::Wildcard) {
        return Err(PatternError::UnanchoredWildcard { edge: "start" });
    }
    if tokens.last() == Some(&Token::Wildcard) {
        return Err(PatternError::UnanchoredWildcard { edge: "end" });
    }
    Ok(())
}
