//! Adding and removing disambiguation wrappers on a tokenized paragraph.

use std::ops::Range;

use crate::context;
use crate::error::AnnotationResult;
use crate::matcher;
use crate::phrase::{self, Phrase};
use crate::pipeline::Stats;
use crate::settings::{SAMEWORD_MACRO, Settings};
use crate::token::Piece;
use crate::tokenize::{Paragraph, RegistryEntry};
use crate::wrap::{is_wrapper, wrap};

/// Which lemma word a lemma rewrite should wrap.
#[derive(Debug, Clone, Copy)]
enum LemmaTarget<'p> {
    /// The first occurrence of the whole phrase.
    Phrase(&'p [String]),
    /// The first token with this key.
    First(&'p str),
    /// The last token with this key.
    Last(&'p str),
}

/// Wraps repeated words around every critical note of a paragraph.
#[derive(Debug, Clone, Copy)]
pub struct Annotator<'s> {
    settings: &'s Settings,
}

impl<'s> Annotator<'s> {
    /// Create an annotator.
    pub const fn new(settings: &'s Settings) -> Self {
        Self { settings }
    }

    /// Annotate every note of `paragraph`, innermost notes first.
    ///
    /// # Errors
    ///
    /// Fails on the first note whose phrase cannot be resolved.
    #[tracing::instrument(level = "debug", skip_all, fields(notes = paragraph.registry.len()))]
    pub fn annotate(&self, paragraph: &mut Paragraph, stats: &mut Stats) -> AnnotationResult<()> {
        let keys = paragraph.keys(self.settings);
        for index in paragraph.processing_order() {
            let entry = paragraph.registry[index];
            stats.notes += 1;

            let Some(app) = paragraph.tokens[entry.end].apparatus().nth(entry.apparatus) else {
                continue;
            };
            if app.analyzed {
                tracing::debug!(start = entry.start, "apparatus already analyzed");
                continue;
            }
            let phrase = phrase::resolve(paragraph, &keys, &entry, self.settings)?;
            if let Some(app) = paragraph.tokens[entry.end].apparatus_mut(entry.apparatus) {
                app.analyzed = true;
            }
            if phrase.is_empty() {
                tracing::debug!(start = entry.start, "empty phrase");
                continue;
            }

            let wrapped = if phrase.is_ellipsis {
                self.ellipsis(paragraph, &keys, &entry, &phrase, stats)?
            } else {
                self.contiguous(paragraph, &keys, &entry, &phrase, stats)?
            };
            if wrapped {
                stats.annotated += 1;
            }
        }
        Ok(())
    }

    /// Annotate a note whose phrase must match as a whole.
    fn contiguous(
        &self,
        paragraph: &mut Paragraph,
        keys: &[Option<String>],
        entry: &RegistryEntry,
        phrase: &Phrase,
        stats: &mut Stats,
    ) -> AnnotationResult<bool> {
        let Some(own) = matcher::find(keys, entry.start..entry.end + 1, &phrase.words, entry.start)
        else {
            tracing::debug!(start = entry.start, "phrase not found in its own note");
            return Ok(false);
        };

        let distance = self.settings.context_distance();
        let before = context::before(&paragraph.tokens, entry.start, distance);
        let after = context::after(&paragraph.tokens, entry.end, distance);
        let mut hits = matcher::find_all(keys, before, &phrase.words);
        hits.extend(matcher::find_all(keys, after, &phrase.words));
        if hits.is_empty() {
            tracing::debug!(start = entry.start, "no match in context");
            return Ok(false);
        }

        stats.wrapped += wrap_span(paragraph, &own, entry.tag());
        stats.wrapped += self.wrap_lemma(paragraph, entry, LemmaTarget::Phrase(&phrase.words))?;
        for hit in &hits {
            stats.wrapped += wrap_span(paragraph, hit, 0);
        }
        Ok(true)
    }

    /// Annotate a note whose lemma elides its middle: each end word is
    /// checked against the context next to it on both sides.
    fn ellipsis(
        &self,
        paragraph: &mut Paragraph,
        keys: &[Option<String>],
        entry: &RegistryEntry,
        phrase: &Phrase,
        stats: &mut Stats,
    ) -> AnnotationResult<bool> {
        let (Some(first_word), Some(last_word)) = (phrase.first(), phrase.last()) else {
            return Ok(false);
        };
        let span = entry.start..entry.end + 1;
        let (Some(first), Some(last)) = (
            position(keys, span.clone(), first_word, false),
            position(keys, span, last_word, true),
        ) else {
            tracing::debug!(start = entry.start, "ellipsis ends not found in their own note");
            return Ok(false);
        };

        let distance = self.settings.context_distance();
        let before = context::before(&paragraph.tokens, first, distance);
        let after = context::after(&paragraph.tokens, last, distance);

        let mut any = false;
        for (anchor, word, target) in [
            (first, first_word, LemmaTarget::First(first_word)),
            (last, last_word, LemmaTarget::Last(last_word)),
        ] {
            let words = std::slice::from_ref(word);
            let mut hits = matcher::find_all(keys, before.clone(), words);
            hits.extend(matcher::find_all(keys, after.clone(), words));
            if hits.is_empty() {
                continue;
            }
            any = true;
            stats.wrapped += wrap_span(paragraph, &(anchor..anchor + 1), entry.tag());
            stats.wrapped += self.wrap_lemma(paragraph, entry, target)?;
            for hit in &hits {
                stats.wrapped += wrap_span(paragraph, hit, 0);
            }
        }
        if !any {
            tracing::debug!(start = entry.start, "no match in context");
        }
        Ok(any)
    }

    /// Wrap `target` inside the lemma of `entry`'s apparatus, untagged.
    fn wrap_lemma(
        &self,
        paragraph: &mut Paragraph,
        entry: &RegistryEntry,
        target: LemmaTarget<'_>,
    ) -> AnnotationResult<usize> {
        let settings = self.settings;
        rewrite_lemma(paragraph, entry, settings, |lemma| {
            let keys = lemma.keys(settings);
            let all = 0..keys.len();
            let span = match target {
                LemmaTarget::Phrase(words) => matcher::find(&keys, all, words, 0),
                LemmaTarget::First(word) => position(&keys, all, word, false).map(|i| i..i + 1),
                LemmaTarget::Last(word) => position(&keys, all, word, true).map(|i| i..i + 1),
            };
            span.map_or(0, |span| wrap_span(lemma, &span, 0))
        })
    }
}

/// Removes every disambiguation wrapper from a paragraph and its lemmas.
#[derive(Debug, Clone, Copy)]
pub struct Cleaner<'s> {
    settings: &'s Settings,
}

impl<'s> Cleaner<'s> {
    /// Create a cleaner.
    pub const fn new(settings: &'s Settings) -> Self {
        Self { settings }
    }

    /// Remove all wrappers from `paragraph`.
    ///
    /// # Errors
    ///
    /// Fails if a lemma inside an apparatus cannot be tokenized.
    #[tracing::instrument(level = "debug", skip_all, fields(tokens = paragraph.tokens.len()))]
    pub fn clean(&self, paragraph: &mut Paragraph, stats: &mut Stats) -> AnnotationResult<()> {
        stats.removed += unwrap_all(paragraph);

        let stale: Vec<RegistryEntry> = paragraph
            .tokens
            .iter()
            .enumerate()
            .flat_map(|(index, token)| {
                token
                    .apparatus()
                    .enumerate()
                    .filter(|(_, app)| app.text.contains(SAMEWORD_MACRO))
                    .map(move |(apparatus, _)| RegistryEntry {
                        level: 0,
                        start: index,
                        end: index,
                        apparatus,
                    })
            })
            .collect();
        for entry in &stale {
            stats.removed += rewrite_lemma(paragraph, entry, self.settings, unwrap_all)?;
        }
        Ok(())
    }
}

/// Wrap a token range and report how many wrappers changed.
fn wrap_span(paragraph: &mut Paragraph, span: &Range<usize>, level: usize) -> usize {
    if span.is_empty() {
        return 0;
    }
    usize::from(wrap(paragraph, span.start, span.end - 1, level))
}

/// The first (or last) token in `range` whose key is `word`.
fn position(keys: &[Option<String>], mut range: Range<usize>, word: &str, last: bool) -> Option<usize> {
    let is = |i: &usize| keys[*i].as_deref() == Some(word);
    if last { range.rev().find(is) } else { range.find(is) }
}

/// Remove every wrapper in `paragraph`.
fn unwrap_all(paragraph: &mut Paragraph) -> usize {
    let wrapped: Vec<usize> = (0..paragraph.tokens.len())
        .filter(|&index| paragraph.tokens[index].has_sameword)
        .collect();
    wrapped
        .into_iter()
        .map(|index| unwrap_token(paragraph, index))
        .sum()
}

/// Remove every wrapper opening on token `index` together with its `}`.
fn unwrap_token(paragraph: &mut Paragraph, index: usize) -> usize {
    let mut removed = 0;
    while let Some(at) = paragraph.tokens[index].pieces.iter().position(is_wrapper) {
        let Piece::Macro(wrapper) = paragraph.tokens[index].pieces.remove(at) else {
            continue;
        };
        removed += 1;
        let Some(id) = wrapper.brace else {
            continue;
        };
        let is_close = |p: &Piece| matches!(p, Piece::Close { opener: Some(o), .. } if *o == id);
        let holds = |t: usize| {
            paragraph
                .tokens
                .get(t)
                .is_some_and(|token| token.pieces.iter().any(is_close))
        };
        let closing = wrapper
            .to_closing
            .map(|d| index + d)
            .filter(|&t| holds(t))
            .or_else(|| (index..paragraph.tokens.len()).find(|&t| holds(t)));
        if let Some(t) = closing
            && let Some(pos) = paragraph.tokens[t].pieces.iter().position(is_close)
        {
            paragraph.tokens[t].pieces.remove(pos);
        }
    }
    paragraph.tokens[index].has_sameword = false;
    removed
}

/// Re-tokenize the lemma of `entry`, let `edit` change it and write it back.
///
/// Does nothing if the apparatus has no lemma.
fn rewrite_lemma<T: Default>(
    paragraph: &mut Paragraph,
    entry: &RegistryEntry,
    settings: &Settings,
    edit: impl FnOnce(&mut Paragraph) -> T,
) -> AnnotationResult<T> {
    let Some(app) = paragraph.tokens[entry.end].apparatus_mut(entry.apparatus) else {
        return Ok(T::default());
    };
    let Some((range, mut lemma)) = phrase::lemma_of(app, settings)? else {
        return Ok(T::default());
    };
    let result = edit(&mut lemma);
    app.text.replace_range(range, &lemma.write());
    Ok(result)
}
