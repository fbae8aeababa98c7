//! Drift diagnostics for patterns that stopped matching.
//!
//! When a step reports `NotFound`, the usual cause is that the target text
//! drifted (renamed prop, reformatted attribute). Pointing at the most
//! similar line makes that visible instead of silent.

/// Lines scoring below this are not worth showing.
const MIN_SIMILARITY: f64 = 0.6;

/// The artifact line that most resembles a pattern's anchor text.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NearMiss {
    /// 1-based line number
    pub line: usize,
    pub similarity: f64,
    pub text: String,
}

/// Find the line of `text` closest to `anchor` by normalized Levenshtein
/// similarity, comparing trimmed lines.
pub fn closest_line(text: &str, anchor: &str) -> Option<NearMiss> {
    let anchor = anchor.trim();
    if anchor.is_empty() {
        return None;
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let line = line.trim();
            NearMiss {
                line: idx + 1,
                similarity: strsim::normalized_levenshtein(anchor, line),
                text: line.to_string(),
            }
        })
        .filter(|candidate| candidate.similarity >= MIN_SIMILARITY)
        .fold(None, |best: Option<NearMiss>, candidate| match best {
            Some(b) if b.similarity >= candidate.similarity => Some(b),
            _ => Some(candidate),
        })
}
