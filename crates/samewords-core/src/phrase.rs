//! Resolving the phrase a note is about.

use std::ops::Range;

use crate::brackets;
use crate::error::{AnnotationError, AnnotationResult};
use crate::macros::{Macro, is_word_char};
use crate::settings::{LEMMA_MACRO, Settings};
use crate::token::{Apparatus, Piece};
use crate::tokenize::{Paragraph, RegistryEntry, Tokenizer};

/// The words a note is searched for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Phrase {
    /// Match keys, case-folded unless matching is case sensitive.
    pub words: Vec<String>,
    /// Whether only the first and last word count.
    pub is_ellipsis: bool,
}

impl Phrase {
    /// Whether there is nothing to search for.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The first word of an ellipsis phrase.
    pub fn first(&self) -> Option<&String> {
        self.words.first()
    }

    /// The last word of an ellipsis phrase.
    pub fn last(&self) -> Option<&String> {
        self.words.last()
    }
}

/// Byte range of the lemma's content inside `apparatus`, braces excluded.
///
/// # Errors
///
/// Returns [`AnnotationError::UnbalancedBrackets`] if the lemma's argument is
/// never closed.
pub fn find_lemma(apparatus: &str) -> AnnotationResult<Option<Range<usize>>> {
    for (pos, _) in apparatus.match_indices(LEMMA_MACRO) {
        let after = &apparatus[pos + LEMMA_MACRO.len()..];
        if after.chars().next().is_some_and(is_word_char) {
            continue;
        }
        if pos > 0 && brackets::is_escape_pair(apparatus, pos - 1) {
            continue;
        }
        let lemma = Macro::describe(apparatus, pos)?;
        if !lemma.opens_brace {
            continue;
        }
        let brace = pos + lemma.source_len() - 1;
        let end = brackets::scan(apparatus, brace)?;
        return Ok(Some(brace + 1..end - 1));
    }
    Ok(None)
}

/// Tokenize the lemma of `app`, if it has one.
///
/// Returns the byte range of the lemma inside the apparatus text together
/// with the tokenized lemma.
pub(crate) fn lemma_of(
    app: &Apparatus,
    settings: &Settings,
) -> AnnotationResult<Option<(Range<usize>, Paragraph)>> {
    let Some(range) = find_lemma(&app.text).map_err(|e| e.rebased(app.offset))? else {
        return Ok(None);
    };
    let lemma = Tokenizer::new(&app.text[range.clone()], settings)
        .with_offset(app.offset + range.start)
        .run()?;
    Ok(Some((range, lemma)))
}

/// Determine the phrase for `entry`.
///
/// The lemma decides when the apparatus has one. Without a lemma the words of
/// the note's own main text are used, if lemma-less notes are allowed.
///
/// # Errors
///
/// [`AnnotationError::MissingLemma`] if the apparatus has no `\lemma` and
/// lemmas are required, and [`AnnotationError::UnbalancedBrackets`] if the
/// lemma's argument is never closed.
pub fn resolve(
    paragraph: &Paragraph,
    keys: &[Option<String>],
    entry: &RegistryEntry,
    settings: &Settings,
) -> AnnotationResult<Phrase> {
    let Some(app) = paragraph.tokens[entry.end].apparatus().nth(entry.apparatus) else {
        return Ok(Phrase::default());
    };

    let Some((_, lemma)) = lemma_of(app, settings)? else {
        if settings.lemma_required() {
            return Err(AnnotationError::missing_lemma(&app.text, app.offset));
        }
        let words = keys[entry.start..=entry.end].iter().flatten().cloned().collect();
        return Ok(Phrase {
            words,
            is_ellipsis: false,
        });
    };

    let mut words: Vec<String> = lemma.keys(settings).into_iter().flatten().collect();
    let is_ellipsis = words.len() > 1 && settings.has_ellipsis(&skeleton(&lemma));
    if is_ellipsis {
        let last = words.len() - 1;
        words.drain(1..last);
    }
    Ok(Phrase { words, is_ellipsis })
}

/// Everything in the lemma except its word text.
///
/// Ellipsis markers are looked for here, so a hyphen inside a word never
/// turns a lemma into an ellipsis.
fn skeleton(lemma: &Paragraph) -> String {
    let mut out = String::new();
    for piece in lemma.tokens.iter().flat_map(|t| &t.pieces) {
        if !matches!(piece, Piece::Content(_)) {
            piece.write_to(&mut out);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::tokenize;

    fn phrase_of(text: &str, settings: &Settings) -> AnnotationResult<Phrase> {
        let paragraph = tokenize(text, settings).unwrap();
        let keys = paragraph.keys(settings);
        let entry = paragraph.registry[0];
        resolve(&paragraph, &keys, &entry, settings)
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn lemma_location() {
        let app = r"{\lemma{so \emph{much}}\Bfootnote{x}}";
        let range = find_lemma(app).unwrap().unwrap();
        assert_eq!(&app[range], r"so \emph{much}");
    }

    #[test]
    fn lemma_prefix_is_not_a_lemma() {
        assert_eq!(find_lemma(r"{\lemmata{x}}").unwrap(), None);
        assert_eq!(find_lemma(r"{\Bfootnote{x}}").unwrap(), None);
    }

    #[test]
    fn single_word_lemma() {
        let settings = Settings::default();
        let phrase = phrase_of(r"\edtext{So}{\lemma{So}\Bfootnote{x}}", &settings).unwrap();
        assert_eq!(phrase.words, words(&["so"]));
        assert!(!phrase.is_ellipsis);
    }

    #[test]
    fn multiword_lemma() {
        let settings = Settings::default();
        let phrase =
            phrase_of(r"\edtext{per causam}{\lemma{per \emph{causam}}\Bfootnote{x}}", &settings).unwrap();
        assert_eq!(phrase.words, words(&["per", "causam"]));
        assert!(!phrase.is_ellipsis);
    }

    #[test]
    fn ellipsis_lemma_keeps_endpoints() {
        let settings = Settings::default();
        for lemma in [r"a \dots{} c", r"a \ldots c", "a -- c", "a–c", "a — c"] {
            let text = format!(r"\edtext{{a b c}}{{\lemma{{{lemma}}}\Bfootnote{{x}}}}");
            let phrase = phrase_of(&text, &settings).unwrap();
            assert_eq!(phrase.words, words(&["a", "c"]), "lemma {lemma}");
            assert!(phrase.is_ellipsis, "lemma {lemma}");
        }
    }

    #[test]
    fn hyphenated_word_is_not_an_ellipsis() {
        let settings = Settings::default();
        let phrase = phrase_of(r"\edtext{lvl3-1 x}{\lemma{lvl3-1 x}\Bfootnote{x}}", &settings).unwrap();
        assert!(!phrase.is_ellipsis);
        assert_eq!(phrase.words, words(&["lvl3-1", "x"]));
    }

    #[test]
    fn lemma_content_hidden_by_macros_is_ignored() {
        let settings = Settings::default();
        let phrase =
            phrase_of(r"\edtext{a}{\lemma{a\Afootnote{not this}}\Bfootnote{x}}", &settings).unwrap();
        assert_eq!(phrase.words, words(&["a"]));
    }

    #[test]
    fn missing_lemma_is_an_error_by_default() {
        let settings = Settings::default();
        let err = phrase_of(r"x \edtext{a}{\Bfootnote{x}}", &settings).unwrap_err();
        assert!(matches!(err, AnnotationError::MissingLemma { offset: 12, .. }));
    }

    #[test]
    fn missing_lemma_falls_back_to_main_text() {
        let settings = Settings::default().with_lemma_required(false);
        let phrase = phrase_of(r"\edtext{Two \emph{words}}{\Bfootnote{x}}", &settings).unwrap();
        assert_eq!(phrase.words, words(&["two", "words"]));
    }

    #[test]
    fn empty_lemma_is_empty_phrase() {
        let settings = Settings::default();
        let phrase = phrase_of(r"\edtext{a}{\lemma{}\Bfootnote{x}}", &settings).unwrap();
        assert!(phrase.is_empty());
    }

    #[test]
    fn case_sensitive_phrase_keeps_case() {
        let settings = Settings::default().with_case_sensitive(true);
        let phrase = phrase_of(r"\edtext{Sortes}{\lemma{Sortes}\Bfootnote{x}}", &settings).unwrap();
        assert_eq!(phrase.first().map(String::as_str), Some("Sortes"));
        assert_eq!(phrase.last(), phrase.first());
    }
}
