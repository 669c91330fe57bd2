//! Context windows around a note.
//!
//! A window is a range of token indices holding a fixed number of tokens with
//! word text. Tokens without words ride along but do not count.

use std::ops::Range;

use crate::token::Token;

/// Tokens before `boundary`, back to the `distance`-th word.
pub fn before(tokens: &[Token], boundary: usize, distance: usize) -> Range<usize> {
    let boundary = boundary.min(tokens.len());
    let mut start = boundary;
    let mut seen = 0;
    while start > 0 && seen < distance {
        start -= 1;
        if tokens[start].has_content() {
            seen += 1;
        }
    }
    start..boundary
}

/// Tokens after `boundary`, up to the `distance`-th word.
pub fn after(tokens: &[Token], boundary: usize, distance: usize) -> Range<usize> {
    let start = (boundary + 1).min(tokens.len());
    let mut end = start;
    let mut seen = 0;
    while end < tokens.len() && seen < distance {
        if tokens[end].has_content() {
            seen += 1;
        }
        end += 1;
    }
    start..end
}
