//! Tokens produced by the tokenizer.
//!
//! A [`Token`] is one word together with everything that hangs on it:
//! macros opened before it, punctuation, closing braces, comments, the
//! whitespace that ends it and any apparatus notes that close after it.
//! The parts are kept as an ordered list of [`Piece`]s, so writing the
//! pieces back in order reproduces the source exactly.

use std::fmt::Write as _;

use crate::macros::Macro;
use crate::settings::Settings;

/// Identity of one opening brace within a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BraceId(pub u32);

/// A literal slice of the source and where it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// The text as written.
    pub text: String,
    /// Byte offset of the text in the paragraph.
    pub offset: usize,
}

impl Fragment {
    /// Create a fragment.
    pub fn new(text: impl Into<String>, offset: usize) -> Self {
        Self {
            text: text.into(),
            offset,
        }
    }
}

/// The second argument of a critical note, kept verbatim with its braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apparatus {
    /// The whole argument, `{` and `}` included.
    pub text: String,
    /// Byte offset of the opening brace.
    pub offset: usize,
    /// Set once the note's search phrase has been resolved in this pass.
    pub analyzed: bool,
}

/// One part of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Word characters.
    Content(Fragment),
    /// Configured punctuation.
    Punctuation(Fragment),
    /// A macro invocation.
    Macro(Macro),
    /// Argument of a hidden or always-counted macro, closing `}` included.
    Hidden {
        /// The argument text after the opening brace.
        fragment: Fragment,
        /// Whether the argument takes part in word matching.
        counted: bool,
    },
    /// A `{` that opens a bare group.
    Open {
        /// The brace.
        fragment: Fragment,
        /// Identity of the group.
        id: BraceId,
        /// Token distance to the closing brace.
        to_closing: Option<usize>,
    },
    /// A `}`.
    Close {
        /// The brace.
        fragment: Fragment,
        /// The opener it closes, if any was open.
        opener: Option<BraceId>,
    },
    /// A `%` comment, without the line break.
    Comment(Fragment),
    /// The whitespace that ended the token.
    Spaces(Fragment),
    /// An apparatus note attached after the token's note closed.
    Apparatus(Apparatus),
}

impl Piece {
    /// The brace this piece opens and the distance to its closing token.
    pub fn opens(&self) -> Option<(BraceId, Option<usize>)> {
        match self {
            Self::Macro(m) => m.brace.map(|id| (id, m.to_closing)),
            Self::Open { id, to_closing, .. } => Some((*id, *to_closing)),
            _ => None,
        }
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        match self {
            Self::Content(f)
            | Self::Punctuation(f)
            | Self::Comment(f)
            | Self::Spaces(f)
            | Self::Hidden { fragment: f, .. }
            | Self::Open { fragment: f, .. }
            | Self::Close { fragment: f, .. } => out.push_str(&f.text),
            Self::Macro(m) => {
                let _ = write!(out, "{m}");
            }
            Self::Apparatus(app) => out.push_str(&app.text),
        }
    }
}

/// A word and its surroundings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    /// The token's parts in source order.
    pub pieces: Vec<Piece>,
    /// Whether a disambiguation wrapper opens on this token.
    pub has_sameword: bool,
}

impl Token {
    /// The word text: all content fragments joined.
    pub fn text(&self) -> String {
        self.content().map(|f| f.text.as_str()).collect()
    }

    /// Whether the token carries any word text.
    pub fn has_content(&self) -> bool {
        self.content().next().is_some()
    }

    /// The key the matcher compares: the word text plus the argument of any
    /// always-counted macro, case-folded unless matching is case sensitive.
    ///
    /// Returns `None` for tokens without word text.
    pub fn key(&self, settings: &Settings) -> Option<String> {
        if !self.has_content() {
            return None;
        }
        let mut key = self.text();
        for piece in &self.pieces {
            if let Piece::Hidden {
                fragment,
                counted: true,
            } = piece
            {
                let arg = fragment.text.strip_suffix('}').unwrap_or(&fragment.text);
                if !arg.is_empty() {
                    key.push('\u{1f}');
                    key.push_str(arg);
                }
            }
        }
        Some(settings.fold(key))
    }

    /// Word text fragments.
    pub fn content(&self) -> impl Iterator<Item = &Fragment> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Content(f) => Some(f),
            _ => None,
        })
    }

    /// Macros in source order.
    pub fn macros(&self) -> impl Iterator<Item = &Macro> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Macro(m) => Some(m),
            _ => None,
        })
    }

    /// Punctuation fragments.
    pub fn punctuation(&self) -> impl Iterator<Item = &Fragment> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Punctuation(f) => Some(f),
            _ => None,
        })
    }

    /// Closing braces and bare opening braces.
    pub fn suffix(&self) -> impl Iterator<Item = &Fragment> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Open { fragment, .. } | Piece::Close { fragment, .. } => Some(fragment),
            _ => None,
        })
    }

    /// Line comments.
    pub fn comments(&self) -> impl Iterator<Item = &Fragment> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Comment(f) => Some(f),
            _ => None,
        })
    }

    /// Apparatus notes in the order they were attached.
    pub fn apparatus(&self) -> impl Iterator<Item = &Apparatus> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Apparatus(app) => Some(app),
            _ => None,
        })
    }

    /// Apparatus notes not yet analyzed in this pass.
    pub fn clean_apps(&self) -> impl Iterator<Item = &Apparatus> {
        self.apparatus().filter(|app| !app.analyzed)
    }

    /// Apparatus notes already analyzed in this pass.
    pub fn ann_apps(&self) -> impl Iterator<Item = &Apparatus> {
        self.apparatus().filter(|app| app.analyzed)
    }

    /// The `ordinal`-th apparatus note on this token.
    pub fn apparatus_mut(&mut self, ordinal: usize) -> Option<&mut Apparatus> {
        self.pieces
            .iter_mut()
            .filter_map(|p| match p {
                Piece::Apparatus(app) => Some(app),
                _ => None,
            })
            .nth(ordinal)
    }

    pub(crate) fn has_apparatus(&self) -> bool {
        self.apparatus().next().is_some()
    }

    /// Whether the next word character has to start a new token.
    ///
    /// That is the case after a closing brace or an apparatus note, and when
    /// the word text is already followed by anything except a comment.
    pub(crate) fn breaks_before_word(&self) -> bool {
        if self
            .pieces
            .iter()
            .any(|p| matches!(p, Piece::Close { .. } | Piece::Apparatus(_)))
        {
            return true;
        }
        let Some(last_content) = self
            .pieces
            .iter()
            .rposition(|p| matches!(p, Piece::Content(_)))
        else {
            return false;
        };
        self.pieces[last_content + 1..]
            .iter()
            .any(|p| !matches!(p, Piece::Comment(_)))
    }

    /// Appends word text, extending the last fragment when it is adjacent.
    pub(crate) fn push_content(&mut self, text: &str, offset: usize) {
        if let Some(Piece::Content(last)) = self.pieces.last_mut()
            && last.offset + last.text.len() == offset
        {
            last.text.push_str(text);
            return;
        }
        self.pieces.push(Piece::Content(Fragment::new(text, offset)));
    }

    /// Index of the first content piece.
    pub(crate) fn first_content(&self) -> Option<usize> {
        self.pieces.iter().position(|p| matches!(p, Piece::Content(_)))
    }

    /// Index of the last content piece.
    pub(crate) fn last_content(&self) -> Option<usize> {
        self.pieces.iter().rposition(|p| matches!(p, Piece::Content(_)))
    }

    /// Write the token back out.
    pub fn write_to(&self, out: &mut String) {
        for piece in &self.pieces {
            piece.write_to(out);
        }
    }
}
