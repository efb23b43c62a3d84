//! Bounded output excerpts.

const ELLIPSIS: &str = "...";

/// Trim `raw` and keep at most `budget` characters of its tail.
///
/// Failures usually explain themselves at the end of the stream, so the tail
/// is kept. A shortened excerpt starts on a word boundary and is prefixed
/// with `...`.
pub fn excerpt(raw: &str, budget: usize) -> String {
    let trimmed = raw.trim();
    let total = trimmed.chars().count();
    if total <= budget {
        return trimmed.to_string();
    }

    let keep = budget.saturating_sub(ELLIPSIS.len());
    if keep == 0 {
        return ELLIPSIS.chars().take(budget).collect();
    }

    let start = trimmed
        .char_indices()
        .nth(total - keep)
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let hard_cut = &trimmed[start..];

    let starts_mid_word = trimmed[..start]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace());
    let tail = if starts_mid_word {
        match hard_cut.find(char::is_whitespace) {
            Some(pos) => hard_cut[pos..].trim_start(),
            None => hard_cut,
        }
    } else {
        hard_cut.trim_start()
    };
    let tail = if tail.is_empty() { hard_cut } else { tail };

    format!("{}{}", ELLIPSIS, tail)
}

/// [`excerpt`] over raw process output.
pub fn excerpt_bytes(raw: &[u8], budget: usize) -> String {
    excerpt(&String::from_utf8_lossy(raw), budget)
}
