//! Pasted word lists into structured entries.

use crate::db::NewWord;

/// Characters that split a line into term and translation.
pub const ENTRY_SEPARATORS: [char; 6] = ['-', '–', '—', ',', '，', '\t'];

/// Parse one entry per non-blank line.
///
/// Accepts `Apple 苹果`, `Apple - 苹果`, `Apple, 苹果` and tab-separated
/// columns. The first part is the term and everything after it is the
/// translation. Lines that do not yield both are skipped.
pub fn parse_word_list(text: &str) -> Vec<NewWord> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<NewWord> {
    let cleaned = line.trim();
    if cleaned.is_empty() {
        return None;
    }

    let mut parts: Vec<&str> = cleaned.split(&ENTRY_SEPARATORS[..]).collect();
    if parts.len() < 2 {
        let (term, rest) = cleaned.split_once(' ')?;
        parts = vec![term, rest];
    }

    let term = parts[0].trim();
    let translation = parts[1..]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if term.is_empty() || translation.is_empty() {
        return None;
    }

    Some(NewWord::new(term, translation))
}
