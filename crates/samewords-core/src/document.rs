//! Splitting a whole document into the paragraphs that get annotated.
//!
//! Only text between `\beginnumbering` and `\endnumbering` is annotated.
//! Every split keeps all bytes, so joining the pieces gives back the input.

use std::sync::LazyLock;

use regex::Regex;

use crate::macros::is_word_char;

const BEGIN_NUMBERING: &str = r"\beginnumbering";
const END_NUMBERING: &str = r"\endnumbering";
const PSTART: &str = r"\pstart";
const AUTOPAR: &str = r"\autopar";

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n)+").expect("valid regex"));

/// A slice of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// The text.
    pub text: &'a str,
    /// Byte offset of the text in the document.
    pub offset: usize,
    /// Whether the text is a numbered section.
    pub numbered: bool,
}

/// Cut `text` into alternating unnumbered and numbered chunks.
///
/// A numbered chunk runs from `\beginnumbering` through the matching
/// `\endnumbering`, or to the end of the text if there is none.
pub fn split_document(text: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    while let Some(begin) = find_macro(text, BEGIN_NUMBERING, pos) {
        if begin > pos {
            chunks.push(Chunk {
                text: &text[pos..begin],
                offset: pos,
                numbered: false,
            });
        }
        let end = find_macro(text, END_NUMBERING, begin)
            .map_or(text.len(), |end| end + END_NUMBERING.len());
        chunks.push(Chunk {
            text: &text[begin..end],
            offset: begin,
            numbered: true,
        });
        pos = end;
    }
    if pos < text.len() {
        chunks.push(Chunk {
            text: &text[pos..],
            offset: pos,
            numbered: false,
        });
    }
    chunks
}

/// Cut a numbered chunk into paragraphs.
///
/// Each paragraph starts at a `\pstart`. Without `\pstart`, a chunk using
/// `\autopar` is cut after every run of blank lines.
pub fn split_paragraphs(chunk: &str) -> Vec<&str> {
    let mut cuts: Vec<usize> = macro_positions(chunk, PSTART).collect();
    if cuts.is_empty() && find_macro(chunk, AUTOPAR, 0).is_some() {
        cuts = BLANK_LINES.find_iter(chunk).map(|m| m.end()).collect();
    }

    let mut paragraphs = Vec::new();
    let mut pos = 0;
    for cut in cuts {
        if cut > pos && cut < chunk.len() {
            paragraphs.push(&chunk[pos..cut]);
            pos = cut;
        }
    }
    if pos < chunk.len() || paragraphs.is_empty() {
        paragraphs.push(&chunk[pos..]);
    }
    paragraphs
}

/// Offsets of `name` in `text` where it is a whole macro name.
fn macro_positions<'a>(text: &'a str, name: &'a str) -> impl Iterator<Item = usize> + 'a {
    text.match_indices(name)
        .map(|(pos, _)| pos)
        .filter(move |&pos| {
            !text[pos + name.len()..]
                .chars()
                .next()
                .is_some_and(is_word_char)
        })
}

fn find_macro(text: &str, name: &str, from: usize) -> Option<usize> {
    macro_positions(text, name).find(|&pos| pos >= from)
}
