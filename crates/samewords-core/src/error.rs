//! Error types for samewords-core.

use thiserror::Error;

/// Maximum number of characters quoted from the input in an error message.
const SNIPPET_CHARS: usize = 50;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,

    /// An ellipsis pattern is not a valid regular expression.
    #[error("invalid ellipsis pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern as written in the configuration.
        pattern: String,
        /// The compilation failure.
        #[source]
        source: Box<regex::Error>,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failures while tokenizing or annotating a paragraph.
///
/// Offsets are byte offsets into the paragraph text handed to the core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    /// A bracket scan started on something other than an opening bracket.
    #[error("expected an opening bracket at byte {offset}, found `{snippet}`")]
    MalformedInput {
        /// Where the bracket was expected.
        offset: usize,
        /// Input text starting at `offset`.
        snippet: String,
    },

    /// The input ended before a bracket group was closed.
    #[error("unbalanced brackets: the group opened at byte {offset} is never closed: `{snippet}`")]
    UnbalancedBrackets {
        /// Where the unclosed group starts.
        offset: usize,
        /// Input text starting at `offset`.
        snippet: String,
    },

    /// An apparatus note has no `\lemma` and lemma-less notes are not allowed.
    #[error("the apparatus note at byte {offset} has no \\lemma: `{snippet}`")]
    MissingLemma {
        /// Where the apparatus note starts.
        offset: usize,
        /// The start of the apparatus note.
        snippet: String,
    },
}

impl AnnotationError {
    pub(crate) fn malformed(text: &str, offset: usize) -> Self {
        Self::MalformedInput {
            offset,
            snippet: snippet(text, offset),
        }
    }

    pub(crate) fn unbalanced(text: &str, offset: usize) -> Self {
        Self::UnbalancedBrackets {
            offset,
            snippet: snippet(text, offset),
        }
    }

    pub(crate) fn missing_lemma(apparatus: &str, offset: usize) -> Self {
        Self::MissingLemma {
            offset,
            snippet: snippet(apparatus, 0),
        }
    }

    /// Byte offset the error refers to.
    pub const fn offset(&self) -> usize {
        match self {
            Self::MalformedInput { offset, .. }
            | Self::UnbalancedBrackets { offset, .. }
            | Self::MissingLemma { offset, .. } => *offset,
        }
    }

    /// Moves the offset by `base`, for errors raised on a slice of the paragraph.
    #[must_use]
    pub(crate) fn rebased(mut self, base: usize) -> Self {
        match &mut self {
            Self::MalformedInput { offset, .. }
            | Self::UnbalancedBrackets { offset, .. }
            | Self::MissingLemma { offset, .. } => *offset += base,
        }
        self
    }
}

/// Result type alias using [`AnnotationError`].
pub type AnnotationResult<T> = Result<T, AnnotationError>;

fn snippet(text: &str, offset: usize) -> String {
    text.get(offset..)
        .unwrap_or_default()
        .chars()
        .take(SNIPPET_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_is_capped() {
        let text = "x".repeat(200);
        let err = AnnotationError::unbalanced(&text, 10);
        match err {
            AnnotationError::UnbalancedBrackets { offset, snippet } => {
                assert_eq!(offset, 10);
                assert_eq!(snippet.chars().count(), SNIPPET_CHARS);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rebase_shifts_offset() {
        let err = AnnotationError::malformed("abc", 1).rebased(40);
        assert_eq!(err.offset(), 41);
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let err = AnnotationError::malformed("æøå{", 1);
        assert!(matches!(err, AnnotationError::MalformedInput { ref snippet, .. } if snippet.is_empty()));
    }
}
