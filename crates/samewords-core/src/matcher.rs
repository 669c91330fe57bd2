//! Phrase search over token keys.
//!
//! Tokens without a key (no word text) are skipped, so a phrase still
//! matches across macros, punctuation-only tokens and the like. Every keyed
//! token between the first and the last word has to match.

use std::ops::Range;

/// Find the first match of `words` inside `window`, starting at `from`.
///
/// Returns the token range from the first to the last matched word.
pub fn find(
    keys: &[Option<String>],
    window: Range<usize>,
    words: &[String],
    from: usize,
) -> Option<Range<usize>> {
    let (first, rest) = words.split_first()?;
    let end = window.end.min(keys.len());
    let mut anchor = from.max(window.start);
    while anchor < end {
        if keys[anchor].as_ref() == Some(first)
            && let Some(last) = match_rest(keys, anchor + 1..end, rest)
        {
            return Some(anchor..last.max(anchor) + 1);
        }
        anchor += 1;
    }
    None
}

/// Every non-overlapping match of `words` inside `window`, left to right.
pub fn find_all(keys: &[Option<String>], window: Range<usize>, words: &[String]) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    let mut from = window.start;
    while let Some(hit) = find(keys, window.clone(), words, from) {
        from = hit.end;
        found.push(hit);
    }
    found
}

/// Index of the token matching the last of `rest`, or the anchor itself
/// (`range.start - 1`) when `rest` is empty.
fn match_rest(keys: &[Option<String>], range: Range<usize>, rest: &[String]) -> Option<usize> {
    let mut last = range.start.checked_sub(1)?;
    let mut expected = rest.iter();
    let Some(mut want) = expected.next() else {
        return Some(last);
    };
    for (i, key) in keys.iter().enumerate().take(range.end).skip(range.start) {
        match key.as_ref() {
            None => {}
            Some(key) if key == want => {
                last = i;
                match expected.next() {
                    Some(next) => want = next,
                    None => return Some(last),
                }
            }
            Some(_) => return None,
        }
    }
    None
}
