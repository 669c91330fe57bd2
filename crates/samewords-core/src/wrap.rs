//! Inserting and merging `\sameword` wrappers.
//!
//! A wrapper is a [`Macro`] piece placed before the first word of a span and
//! a [`Piece::Close`] placed after the last one. Tokens are never added or
//! removed, so registry indices stay valid while wrapping.

use std::collections::HashSet;

use crate::macros::Macro;
use crate::settings::SAMEWORD_MACRO;
use crate::token::{BraceId, Fragment, Piece, Token};
use crate::tokenize::Paragraph;

/// Whether `piece` is a disambiguation wrapper that opens a brace.
pub(crate) fn is_wrapper(piece: &Piece) -> bool {
    matches!(piece, Piece::Macro(m) if m.name == SAMEWORD_MACRO && m.brace.is_some())
}

/// Wrap tokens `first..=last` and tag the wrapper with `level` (0 = untagged).
///
/// A wrapper that already covers exactly this span gets `level` merged into
/// its levels instead. Returns `false` when the span cannot be wrapped
/// without interleaving braces with the surrounding groups.
pub fn wrap(paragraph: &mut Paragraph, first: usize, last: usize, level: usize) -> bool {
    if first > last || last >= paragraph.tokens.len() {
        return false;
    }
    if merge_exact(&mut paragraph.tokens[first], last - first, level) {
        return true;
    }

    let tokens = &paragraph.tokens;
    let Some(content) = tokens[first].first_content() else {
        return false;
    };
    let insert_at = insertion_point(&tokens[first], first, last, content);

    let mut inside: HashSet<BraceId> = tokens[first].pieces[insert_at..]
        .iter()
        .filter_map(|p| p.opens().map(|(id, _)| id))
        .collect();
    let Some(closing) = closing_token(tokens, first, last, insert_at, &mut inside) else {
        tracing::debug!(first, last, "span holds an unclosed group, not wrapped");
        return false;
    };
    let close_at = close_position(&tokens[closing], &inside);

    if !balanced(tokens, first, insert_at, closing, close_at, &inside) {
        tracing::debug!(first, last, "wrapper would interleave with braces, not wrapped");
        return false;
    }

    let offset = match &tokens[first].pieces[content] {
        Piece::Content(fragment) => fragment.offset,
        _ => 0,
    };
    let levels = if level == 0 { Vec::new() } else { vec![level] };
    let id = paragraph.new_brace();
    let mut wrapper = Macro::wrapper(SAMEWORD_MACRO, &levels, id, offset);
    wrapper.to_closing = Some(closing - first);

    paragraph.tokens[closing].pieces.insert(
        close_at,
        Piece::Close {
            fragment: Fragment::new("}", offset),
            opener: Some(id),
        },
    );
    let token = &mut paragraph.tokens[first];
    token.pieces.insert(insert_at, Piece::Macro(wrapper));
    token.has_sameword = true;
    true
}

/// Merge `level` into a wrapper on `token` that spans exactly `span` tokens.
fn merge_exact(token: &mut Token, span: usize, level: usize) -> bool {
    let content = token.first_content().unwrap_or(token.pieces.len());
    for piece in &mut token.pieces[..content] {
        if let Piece::Macro(m) = piece
            && m.name == SAMEWORD_MACRO
            && m.brace.is_some()
            && m.to_closing == Some(span)
        {
            m.merge_level(level);
            return true;
        }
    }
    false
}

/// Where the wrapper macro goes on the first token.
///
/// Before the first group that closes inside the span, so that group ends up
/// inside the wrapper. Otherwise directly before the word.
fn insertion_point(token: &Token, first: usize, last: usize, content: usize) -> usize {
    token.pieces[..content]
        .iter()
        .position(|piece| {
            piece
                .opens()
                .is_some_and(|(_, to_closing)| to_closing.is_some_and(|d| first + d < last))
        })
        .unwrap_or(content)
}

/// The token that has to carry the closing brace.
///
/// That is `last`, unless a group opened inside the span closes further on.
/// Returns `None` if such a group never closes.
fn closing_token(
    tokens: &[Token],
    first: usize,
    last: usize,
    insert_at: usize,
    inside: &mut HashSet<BraceId>,
) -> Option<usize> {
    let mut closing = last;
    let mut scanned = first;
    let mut farthest = first;
    for piece in &tokens[first].pieces[insert_at..] {
        if let Some((_, to_closing)) = piece.opens() {
            farthest = farthest.max(first + to_closing?);
        }
    }
    loop {
        for (index, token) in tokens.iter().enumerate().take(closing + 1).skip(scanned + 1) {
            for (id, to_closing) in token.pieces.iter().filter_map(Piece::opens) {
                inside.insert(id);
                farthest = farthest.max(index + to_closing?);
            }
        }
        scanned = closing;
        if farthest <= closing {
            return Some(closing);
        }
        closing = farthest.min(tokens.len() - 1);
    }
}

/// Where the closing brace goes on the closing token.
///
/// After the last word and the counted macros attached to it, and after any
/// braces that close groups opened inside the span, along with the apparatus
/// notes that follow them.
fn close_position(token: &Token, inside: &HashSet<BraceId>) -> usize {
    let mut at = token.last_content().map_or(0, |i| i + 1);
    let mut after_inner_close = false;
    while let Some(piece) = token.pieces.get(at) {
        match piece {
            Piece::Macro(_) if is_counted(token.pieces.get(at + 1)) => {}
            Piece::Hidden { counted: true, .. } => {}
            Piece::Close {
                opener: Some(id), ..
            } if inside.contains(id) => after_inner_close = true,
            Piece::Apparatus(_) if after_inner_close => {}
            _ => break,
        }
        at += 1;
    }
    at
}

fn is_counted(piece: Option<&Piece>) -> bool {
    matches!(piece, Some(Piece::Hidden { counted: true, .. }))
}

/// Whether every `}` between the wrapper's braces closes a group opened
/// between them.
fn balanced(
    tokens: &[Token],
    first: usize,
    insert_at: usize,
    closing: usize,
    close_at: usize,
    inside: &HashSet<BraceId>,
) -> bool {
    (first..=closing).all(|index| {
        let pieces = &tokens[index].pieces;
        let from = if index == first { insert_at } else { 0 };
        let to = if index == closing { close_at } else { pieces.len() };
        pieces.get(from..to).unwrap_or_default().iter().all(|piece| match piece {
            Piece::Close { opener, .. } => opener.is_some_and(|id| inside.contains(&id)),
            _ => true,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::tokenize::tokenize;

    fn wrapped(text: &str, first: usize, last: usize, level: usize) -> (bool, String) {
        let mut paragraph = tokenize(text, &Settings::default()).unwrap();
        let done = wrap(&mut paragraph, first, last, level);
        (done, paragraph.write())
    }

    #[test]
    fn plain_word() {
        assert_eq!(wrapped("a so b", 1, 1, 0), (true, r"a \sameword{so} b".into()));
        assert_eq!(wrapped("a so b", 1, 1, 2), (true, r"a \sameword[2]{so} b".into()));
    }

    #[test]
    fn punctuation_stays_outside() {
        assert_eq!(wrapped("(so), b", 0, 0, 0), (true, r"(\sameword{so}), b".into()));
    }

    #[test]
    fn phrase_across_tokens() {
        assert_eq!(
            wrapped("per causam est", 0, 1, 1),
            (true, r"\sameword[1]{per causam} est".into())
        );
    }

    #[test]
    fn level_is_merged_into_exact_wrapper() {
        let (done, text) = wrapped(r"\sameword[1]{x} y", 0, 0, 2);
        assert!(done);
        assert_eq!(text, r"\sameword[1,2]{x} y");
        assert_eq!(wrapped(r"\sameword[2]{x}", 0, 0, 0).1, r"\sameword[2]{x}");
    }

    #[test]
    fn wider_span_wraps_existing_wrapper() {
        assert_eq!(
            wrapped(r"per \sameword{causam} est", 0, 1, 0).1,
            r"\sameword{per \sameword{causam}} est"
        );
        assert_eq!(
            wrapped(r"\sameword{per} causam est", 0, 1, 1).1,
            r"\sameword[1]{\sameword{per} causam} est"
        );
    }

    #[test]
    fn narrower_span_goes_inside_existing_wrapper() {
        assert_eq!(
            wrapped(r"\sameword{per causam} est", 1, 1, 0).1,
            r"\sameword{per \sameword{causam}} est"
        );
    }

    #[test]
    fn enclosing_group_stays_outside() {
        assert_eq!(
            wrapped(r"\emph{per causam} est", 0, 1, 0).1,
            r"\emph{\sameword{per causam}} est"
        );
        assert_eq!(wrapped(r"\emph{so}", 0, 0, 0).1, r"\emph{\sameword{so}}");
    }

    #[test]
    fn group_inside_span_is_enclosed() {
        assert_eq!(
            wrapped(r"\emph{per} causam", 0, 1, 0).1,
            r"\sameword{\emph{per} causam}"
        );
    }

    #[test]
    fn nested_note_inside_span_is_enclosed() {
        let text = r"per \edtext{causam}{\lemma{causam}\Bfootnote{x}} est";
        assert_eq!(
            wrapped(text, 0, 1, 0).1,
            r"\sameword{per \edtext{causam}{\lemma{causam}\Bfootnote{x}}} est"
        );
    }

    #[test]
    fn note_wrapper_sits_inside_the_note() {
        let text = r"\edtext{so}{\lemma{so}\Bfootnote{x}} so";
        assert_eq!(
            wrapped(text, 0, 0, 1).1,
            r"\edtext{\sameword[1]{so}}{\lemma{so}\Bfootnote{x}} so"
        );
    }

    #[test]
    fn counted_macro_stays_inside() {
        assert_eq!(
            wrapped(r"Sortes\index[persons]{Sortes} dicit", 0, 0, 1).1,
            r"\sameword[1]{Sortes\index[persons]{Sortes}} dicit"
        );
        assert_eq!(
            wrapped(r"\edtext{Sortes\index{Sortes}}{\Afootnote{x}}", 0, 0, 1).1,
            r"\edtext{\sameword[1]{Sortes\index{Sortes}}}{\Afootnote{x}}"
        );
    }

    #[test]
    fn interleaving_span_is_refused() {
        let (done, text) = wrapped(r"\emph{a b} c", 1, 2, 0);
        assert!(!done);
        assert_eq!(text, r"\emph{a b} c");
    }
}
