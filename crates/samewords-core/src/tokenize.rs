//! Single-pass tokenizer and the registry of critical notes.
//!
//! [`Tokenizer::run`] turns one paragraph into a [`Paragraph`]: the tokens,
//! with every byte of the input attached to exactly one of them, and a
//! registry entry for every `\edtext` whose apparatus was found.

use crate::brackets;
use crate::error::AnnotationResult;
use crate::macros::{Macro, is_word_char};
use crate::settings::{NOTE_MACRO, SAMEWORD_MACRO, Settings};
use crate::token::{Apparatus, BraceId, Fragment, Piece, Token};

/// The location of one critical note in the token sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Nesting depth, 0 for a note that is not inside another note.
    pub level: usize,
    /// Index of the token carrying the `\edtext` macro.
    pub start: usize,
    /// Index of the token carrying the apparatus.
    pub end: usize,
    /// Which apparatus on the end token belongs to this note.
    pub apparatus: usize,
}

impl RegistryEntry {
    /// The level tag this note's own wrapper carries.
    pub const fn tag(&self) -> usize {
        self.level + 1
    }
}

/// A tokenized paragraph.
#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    /// Tokens in source order.
    pub tokens: Vec<Token>,
    /// Complete notes in document order.
    pub registry: Vec<RegistryEntry>,
    next_brace: u32,
}

impl Paragraph {
    /// Reassemble the paragraph text.
    pub fn write(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            token.write_to(&mut out);
        }
        out
    }

    /// The match key of every token.
    pub fn keys(&self, settings: &Settings) -> Vec<Option<String>> {
        self.tokens.iter().map(|t| t.key(settings)).collect()
    }

    /// Registry indices, innermost notes first.
    ///
    /// Notes on the same level keep their document order.
    pub fn processing_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.registry.len()).collect();
        order.sort_by(|a, b| self.registry[*b].level.cmp(&self.registry[*a].level));
        order
    }

    /// A brace identity not used anywhere in this paragraph yet.
    pub(crate) fn new_brace(&mut self) -> BraceId {
        let id = BraceId(self.next_brace);
        self.next_brace += 1;
        id
    }
}

/// Tokenize `text` with `settings`.
///
/// # Errors
///
/// Returns [`AnnotationError::UnbalancedBrackets`](crate::AnnotationError::UnbalancedBrackets) if a hidden macro argument
/// or an apparatus note is never closed.
pub fn tokenize(text: &str, settings: &Settings) -> AnnotationResult<Paragraph> {
    Tokenizer::new(text, settings).run()
}

/// Scanner state for one paragraph.
#[derive(Debug)]
pub struct Tokenizer<'a> {
    text: &'a str,
    settings: &'a Settings,
    base: usize,
}

#[derive(Debug, Clone, Copy)]
struct Opener {
    id: BraceId,
    token: usize,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    entry: usize,
    depth: usize,
}

#[derive(Debug, Clone, Copy)]
struct Partial {
    level: usize,
    start: usize,
    end: Option<(usize, usize)>,
}

#[derive(Debug, Default)]
struct State {
    paragraph: Paragraph,
    current: Token,
    openers: Vec<Opener>,
    pending: Vec<Pending>,
    notes: Vec<Partial>,
    depth: usize,
}

impl State {
    fn index(&self) -> usize {
        self.paragraph.tokens.len()
    }

    fn finish(&mut self) {
        if !self.current.pieces.is_empty() {
            let token = std::mem::take(&mut self.current);
            self.paragraph.tokens.push(token);
        }
    }

    fn word(&mut self, text: &str, offset: usize) {
        if self.current.breaks_before_word() {
            self.finish();
        }
        self.current.push_content(text, offset);
    }

    fn open(&mut self) -> BraceId {
        let id = self.paragraph.new_brace();
        self.openers.push(Opener {
            id,
            token: self.index(),
        });
        self.depth += 1;
        id
    }

    fn close(&mut self) -> Option<BraceId> {
        let opener = self.openers.pop()?;
        self.depth = self.depth.saturating_sub(1);
        let distance = self.index() - opener.token;
        let token = if opener.token == self.index() {
            &mut self.current
        } else {
            &mut self.paragraph.tokens[opener.token]
        };
        for piece in &mut token.pieces {
            match piece {
                Piece::Macro(m) if m.brace == Some(opener.id) => m.to_closing = Some(distance),
                Piece::Open { id, to_closing, .. } if *id == opener.id => {
                    *to_closing = Some(distance);
                }
                _ => {}
            }
        }
        Some(opener.id)
    }

    fn into_paragraph(mut self) -> Paragraph {
        self.finish();
        let mut paragraph = self.paragraph;
        paragraph.registry = self
            .notes
            .into_iter()
            .filter_map(|note| {
                let (end, apparatus) = note.end?;
                Some(RegistryEntry {
                    level: note.level,
                    start: note.start,
                    end,
                    apparatus,
                })
            })
            .collect();
        paragraph
    }
}

impl<'a> Tokenizer<'a> {
    /// Prepare to tokenize `text`.
    pub const fn new(text: &'a str, settings: &'a Settings) -> Self {
        Self {
            text,
            settings,
            base: 0,
        }
    }

    /// Report offsets relative to an enclosing text that `text` starts at `base` of.
    #[must_use]
    pub const fn with_offset(mut self, base: usize) -> Self {
        self.base = base;
        self
    }

    /// Tokenize the whole text.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotationError::UnbalancedBrackets`](crate::AnnotationError::UnbalancedBrackets) if a hidden macro
    /// argument or an apparatus note is never closed.
    #[tracing::instrument(level = "trace", skip_all, fields(len = self.text.len(), base = self.base))]
    pub fn run(&self) -> AnnotationResult<Paragraph> {
        let mut state = State::default();
        let mut pos = 0;
        while let Some(c) = self.text[pos..].chars().next() {
            pos = self.step(&mut state, pos, c)?;
        }
        let paragraph = state.into_paragraph();
        tracing::trace!(
            tokens = paragraph.tokens.len(),
            notes = paragraph.registry.len(),
            "tokenized"
        );
        Ok(paragraph)
    }

    /// Consume one syntactic unit at `pos` and return the position after it.
    fn step(&self, state: &mut State, pos: usize, c: char) -> AnnotationResult<usize> {
        let text = self.text;
        let at = self.base + pos;
        if is_word_char(c) {
            let end = self.word_end(pos);
            state.word(&text[pos..end], at);
            return Ok(end);
        }
        if c.is_whitespace() {
            let end = text[pos..]
                .find(|c: char| !c.is_whitespace())
                .map_or(text.len(), |n| pos + n);
            state
                .current
                .pieces
                .push(Piece::Spaces(Fragment::new(&text[pos..end], at)));
            state.finish();
            return Ok(end);
        }
        match c {
            '\\' => self.backslash(state, pos),
            '{' => self.open_brace(state, pos),
            '}' => {
                let opener = state.close();
                state.current.pieces.push(Piece::Close {
                    fragment: Fragment::new("}", at),
                    opener,
                });
                Ok(pos + 1)
            }
            '%' => {
                let end = text[pos..].find('\n').map_or(text.len(), |n| pos + n);
                state
                    .current
                    .pieces
                    .push(Piece::Comment(Fragment::new(&text[pos..end], at)));
                Ok(end)
            }
            '.' if self.digit_follows(pos + 1) => {
                state.word(".", at);
                Ok(pos + 1)
            }
            c if self.settings.is_punctuation(c) => {
                let end = pos + c.len_utf8();
                state
                    .current
                    .pieces
                    .push(Piece::Punctuation(Fragment::new(&text[pos..end], at)));
                Ok(end)
            }
            c => {
                let end = pos + c.len_utf8();
                state.word(&text[pos..end], at);
                Ok(end)
            }
        }
    }

    /// End of the word starting at `pos`.
    ///
    /// A hyphen between word characters and a dot before a digit stay inside
    /// the word.
    fn word_end(&self, pos: usize) -> usize {
        let text = self.text;
        let mut chars = text[pos..].char_indices().peekable();
        let mut end = pos;
        while let Some((i, c)) = chars.next() {
            let joins = matches!(c, '-' | '.')
                && chars.peek().is_some_and(|&(_, next)| {
                    if c == '.' {
                        next.is_ascii_digit()
                    } else {
                        is_word_char(next)
                    }
                });
            if is_word_char(c) || joins {
                end = pos + i + c.len_utf8();
            } else {
                break;
            }
        }
        end
    }

    fn digit_follows(&self, pos: usize) -> bool {
        self.text[pos..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn backslash(&self, state: &mut State, pos: usize) -> AnnotationResult<usize> {
        let text = self.text;
        let at = self.base + pos;
        if brackets::is_escape_pair(text, pos) {
            state.word(&text[pos..pos + 2], at);
            return Ok(pos + 2);
        }

        let mut m = Macro::describe(text, pos).map_err(|e| e.rebased(self.base))?;
        m.offset = at;
        let end = pos + m.source_len();
        let included = self.settings.is_included(&m.name);
        let excluded = self.settings.is_excluded(&m.name);

        if state.current.has_apparatus() || (state.current.has_content() && !included) {
            state.finish();
        }

        if (included || excluded) && m.opens_brace {
            let brace = end - 1;
            let close = brackets::scan(text, brace).map_err(|e| e.rebased(self.base))?;
            m.to_closing = Some(0);
            state.current.pieces.push(Piece::Macro(m));
            state.current.pieces.push(Piece::Hidden {
                fragment: Fragment::new(&text[end..close], self.base + end),
                counted: included,
            });
            if excluded {
                state.finish();
            }
            return Ok(close);
        }

        if m.opens_brace {
            if m.name == NOTE_MACRO {
                let note = Partial {
                    level: state.pending.len(),
                    start: state.index(),
                    end: None,
                };
                let pending = Pending {
                    entry: state.notes.len(),
                    depth: state.depth,
                };
                state.notes.push(note);
                state.pending.push(pending);
            }
            m.brace = Some(state.open());
        }
        if m.name == SAMEWORD_MACRO {
            state.current.has_sameword = true;
        }
        state.current.pieces.push(Piece::Macro(m));
        Ok(end)
    }

    fn open_brace(&self, state: &mut State, pos: usize) -> AnnotationResult<usize> {
        let at = self.base + pos;
        if let Some(pending) = state.pending.last().copied()
            && pending.depth == state.depth
        {
            let close = brackets::scan(self.text, pos).map_err(|e| e.rebased(self.base))?;
            let ordinal = state.current.apparatus().count();
            state.current.pieces.push(Piece::Apparatus(Apparatus {
                text: self.text[pos..close].to_string(),
                offset: at,
                analyzed: false,
            }));
            state.pending.pop();
            let end = state.index();
            state.notes[pending.entry].end = Some((end, ordinal));
            return Ok(close);
        }

        let id = state.open();
        state.current.pieces.push(Piece::Open {
            fragment: Fragment::new("{", at),
            id,
            to_closing: None,
        });
        Ok(pos + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnotationError;

    fn run(text: &str) -> Paragraph {
        tokenize(text, &Settings::default()).unwrap()
    }

    fn words(paragraph: &Paragraph) -> Vec<String> {
        paragraph
            .tokens
            .iter()
            .filter(|t| t.has_content())
            .map(Token::text)
            .collect()
    }

    #[test]
    fn round_trip() {
        for text in [
            "",
            "  leading and trailing  ",
            "Sentence, with punctuation; and (parentheses)!",
            r"Text with \emph{with \textbf{nesting} emphasis} inside.",
            "line one % a comment\nline two",
            r"so \edtext{\edtext{\edtext{so}{\lemma{so}\Bfootnote{lev 3}}}{\lemma{so}\Bfootnote{lev 2}}}{\lemma{so}\Bfootnote{lev 1}}",
            r"unbalanced } closing and \sameword[1,2]{wrapped} words",
            "ἀρχὴ καὶ λόγος · τέλος",
        ] {
            assert_eq!(run(text).write(), text);
        }
    }

    #[test]
    fn whitespace_ends_tokens() {
        let paragraph = run("Some words\n\nhere");
        assert_eq!(words(&paragraph), ["Some", "words", "here"]);
        assert_eq!(paragraph.tokens.len(), 3);
    }

    #[test]
    fn nested_macros_keep_words_apart() {
        let paragraph = run(r"\emph{with \textbf{nesting} emphasis}");
        assert_eq!(words(&paragraph), ["with", "nesting", "emphasis"]);
        let emph = paragraph.tokens[0].macros().next().unwrap();
        assert_eq!(emph.to_closing, Some(2));
        let textbf = paragraph.tokens[1].macros().next().unwrap();
        assert_eq!(textbf.to_closing, Some(0));
    }

    #[test]
    fn word_after_closing_brace_starts_new_token() {
        let paragraph = run(r"\emph{so}much");
        assert_eq!(words(&paragraph), ["so", "much"]);
    }

    #[test]
    fn macro_inside_a_word_splits_it() {
        let paragraph = run(r"So\emph{cra}tes dixit");
        assert_eq!(words(&paragraph), ["So", "cra", "tes", "dixit"]);
        assert_eq!(paragraph.write(), r"So\emph{cra}tes dixit");
    }

    #[test]
    fn registry_for_single_note() {
        let paragraph = run(r"emphasis \edtext{emphasis}{\Bfootnote{fnote}} is emphasis");
        assert_eq!(
            paragraph.registry,
            [RegistryEntry {
                level: 0,
                start: 1,
                end: 1,
                apparatus: 0
            }]
        );
        let app = paragraph.tokens[1].apparatus().next().unwrap();
        assert_eq!(app.text, r"{\Bfootnote{fnote}}");
        assert_eq!(app.offset, 26);
    }

    #[test]
    fn registry_for_nested_notes_on_one_token() {
        let paragraph = run(
            r"so \edtext{\edtext{\edtext{so}{\lemma{so}\Bfootnote{lev 3}}}{\lemma{so}\Bfootnote{lev 2}}}{\lemma{so}\Bfootnote{lev 1}}",
        );
        let levels: Vec<_> = paragraph
            .registry
            .iter()
            .map(|e| (e.level, e.start, e.end, e.apparatus))
            .collect();
        assert_eq!(levels, [(0, 1, 1, 2), (1, 1, 1, 1), (2, 1, 1, 0)]);
        assert_eq!(paragraph.processing_order(), [2, 1, 0]);
        assert_eq!(paragraph.tokens[1].apparatus().count(), 3);
    }

    #[test]
    fn registry_for_multiword_nested_notes() {
        let paragraph = run(r"a \edtext{b \edtext{c d}{\lemma{c d}\Afootnote{x}} e}{\lemma{b e}\Afootnote{y}} f");
        let spans: Vec<_> = paragraph
            .registry
            .iter()
            .map(|e| (e.level, e.start, e.end))
            .collect();
        assert_eq!(spans, [(0, 1, 4), (1, 2, 3)]);
        assert_eq!(words(&paragraph), ["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn apparatus_words_are_not_tokens() {
        let paragraph = run(r"\edtext{lemma}{\Bfootnote{a b c}} after");
        assert_eq!(words(&paragraph), ["lemma", "after"]);
    }

    #[test]
    fn excluded_macro_is_hidden() {
        let paragraph = run(r"word\Afootnote{not a word} next");
        assert_eq!(words(&paragraph), ["word", "next"]);
        assert!(paragraph.tokens[1].pieces.iter().any(|p| matches!(
            p,
            Piece::Hidden {
                counted: false,
                ..
            }
        )));
    }

    #[test]
    fn included_macro_stays_on_its_word() {
        let settings = Settings::default();
        let paragraph = tokenize(r"Sortes\index[persons]{Socrates} dixit Sortes", &settings).unwrap();
        assert_eq!(words(&paragraph), ["Sortes", "dixit", "Sortes"]);
        let keys = paragraph.keys(&settings);
        assert_ne!(keys[0], keys[2]);
    }

    #[test]
    fn decimals_and_escapes_are_words() {
        let paragraph = run(r"skip .5em and 2.5 for AT\&T");
        assert_eq!(words(&paragraph), ["skip", ".5em", "and", "2.5", "for", r"AT\&T"]);
    }

    #[test]
    fn hyphenated_words_stay_together() {
        let paragraph = run("a well-known lvl3-1 -- end-");
        assert_eq!(words(&paragraph), ["a", "well-known", "lvl3-1", "end"]);
    }

    #[test]
    fn punctuation_does_not_count_as_word() {
        let paragraph = run("(so), so.");
        assert_eq!(words(&paragraph), ["so", "so"]);
        assert_eq!(paragraph.tokens[0].punctuation().count(), 3);
    }

    #[test]
    fn comment_keeps_word_open() {
        let paragraph = run("some%\nthing");
        assert_eq!(paragraph.tokens[0].comments().count(), 1);
        assert_eq!(words(&paragraph), ["some", "thing"]);
    }

    #[test]
    fn sameword_is_flagged() {
        let paragraph = run(r"\sameword[1]{so} far");
        assert!(paragraph.tokens[0].has_sameword);
        assert!(!paragraph.tokens[1].has_sameword);
    }

    #[test]
    fn offsets_are_rebased() {
        let settings = Settings::default();
        let paragraph = Tokenizer::new("a b", &settings).with_offset(10).run().unwrap();
        let offsets: Vec<_> = paragraph
            .tokens
            .iter()
            .flat_map(|t| t.content().map(|f| f.offset).collect::<Vec<_>>())
            .collect();
        assert_eq!(offsets, [10, 12]);
    }

    #[test]
    fn unclosed_apparatus_is_an_error() {
        let err = tokenize(r"x \edtext{a}{\lemma{a}", &Settings::default()).unwrap_err();
        assert!(matches!(err, AnnotationError::UnbalancedBrackets { offset: 12, .. }));
    }

    #[test]
    fn unclosed_hidden_argument_reports_rebased_offset() {
        let settings = Settings::default();
        let err = Tokenizer::new(r"\Afootnote{x", &settings)
            .with_offset(100)
            .run()
            .unwrap_err();
        assert_eq!(err.offset(), 110);
    }

    #[test]
    fn note_without_apparatus_is_not_registered() {
        let paragraph = run(r"\edtext{only one argument} here");
        assert!(paragraph.registry.is_empty());
    }
}
