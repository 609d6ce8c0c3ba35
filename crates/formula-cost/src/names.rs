//! Identifier scanning and name normalization.
//!
//! Formulas reference variables and products by free-text names that may contain spaces
//! (`Peso 50x50 * Perda Corte`). A name is a maximal run of letters, digits, underscores and
//! embedded whitespace; runs that are plain decimal literals are numbers, not names. The
//! lexer and [`extract_candidate_names`] share [`scan_word`] so they always agree on where a
//! name starts and ends.
use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WordKind {
    Number,
    Name,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Word<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
    pub kind: WordKind,
}

/// Combining marks continue a word so decomposed spellings (`c` + U+0327) stay one name.
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || unicode_normalization::char::is_combining_mark(c)
}

/// Whether a word starts at `start` (which must be a char boundary).
pub(crate) fn starts_word(src: &str, start: usize) -> bool {
    let mut chars = src[start..].chars();
    match chars.next() {
        Some(c) if is_word_char(c) => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Scans the word starting at `start`. Callers must check [`starts_word`] first.
///
/// Whitespace is only part of a word when another word character follows it, so trailing
/// blanks before an operator are never included. A `.` is accepted only inside a run of
/// ASCII digits (a decimal point), and once a fraction has started only digits may follow.
pub(crate) fn scan_word(src: &str, start: usize) -> Word<'_> {
    let mut end = start;
    let mut all_digits = true;
    let mut in_fraction = false;
    let mut iter = src[start..].char_indices().peekable();

    while let Some(&(offset, c)) = iter.peek() {
        let pos = start + offset;
        if in_fraction {
            if !c.is_ascii_digit() {
                break;
            }
            end = pos + c.len_utf8();
            iter.next();
            continue;
        }

        if is_word_char(c) {
            if !c.is_ascii_digit() {
                all_digits = false;
            }
            end = pos + c.len_utf8();
            iter.next();
        } else if c == '.' && all_digits && src[pos + 1..].starts_with(|n: char| n.is_ascii_digit())
        {
            in_fraction = true;
            end = pos + 1;
            iter.next();
        } else if c.is_whitespace() && end > start {
            let rest = src[pos..].trim_start();
            if !rest.starts_with(is_word_char) {
                break;
            }
            // Skip the blanks; the next iteration picks up the following word char.
            while iter.peek().is_some_and(|&(_, w)| w.is_whitespace()) {
                iter.next();
            }
            all_digits = false;
        } else {
            break;
        }
    }

    let text = &src[start..end];
    let kind = if text.chars().all(|c| c.is_ascii_digit() || c == '.') {
        WordKind::Number
    } else {
        WordKind::Name
    };
    Word {
        text,
        start,
        end,
        kind,
    }
}

/// Returns every candidate identifier mentioned in `formula`.
///
/// Never fails: text that the evaluator would reject still yields whatever names it
/// contains.
pub fn extract_candidate_names(formula: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut pos = 0;
    while pos < formula.len() {
        if starts_word(formula, pos) {
            let word = scan_word(formula, pos);
            if word.kind == WordKind::Name {
                names.insert(word.text.to_string());
            }
            pos = word.end;
        } else {
            pos += formula[pos..].chars().next().map_or(1, char::len_utf8);
        }
    }
    names
}

/// Canonical lookup key for a variable, product, or formula token.
///
/// Applies NFKC, trims, lower-cases, and collapses each run of inner whitespace into a single
/// `_`, so `"Peso  50x50"`, `" peso 50X50 "` and `"peso_50x50"` all map to `peso_50x50`.
pub fn normalize(raw: &str) -> String {
    let composed: String = raw.nfkc().collect();
    let mut out = String::with_capacity(composed.len());
    let mut pending_separator = false;
    for ch in composed.trim().chars() {
        if ch.is_whitespace() {
            pending_separator = true;
            continue;
        }
        if pending_separator {
            out.push('_');
            pending_separator = false;
        }
        out.extend(ch.to_lowercase());
    }
    out
}
