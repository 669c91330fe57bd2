//! Brace matching for TeX groups.
//!
//! The scanner works on bytes: every delimiter it cares about is ASCII, so it
//! can never stop inside a multi-byte character.

use crate::error::{AnnotationError, AnnotationResult};

/// Characters that form a literal escape when preceded by a backslash.
pub const SPECIAL_CHARS: &[u8] = br"\&%$#_{}~^";

/// Returns `true` if `text[pos..]` starts with a backslash escape pair like `\{`.
pub fn is_escape_pair(text: &str, pos: usize) -> bool {
    let bytes = text.as_bytes();
    bytes.get(pos) == Some(&b'\\')
        && bytes
            .get(pos + 1)
            .is_some_and(|next| SPECIAL_CHARS.contains(next))
}

/// Returns the offset one past the `}` that closes the `{` at `pos`.
///
/// # Errors
///
/// [`AnnotationError::MalformedInput`] if `text[pos]` is not `{`, and
/// [`AnnotationError::UnbalancedBrackets`] if the text ends before the group
/// is closed.
pub fn scan(text: &str, pos: usize) -> AnnotationResult<usize> {
    let bytes = text.as_bytes();
    if bytes.get(pos) != Some(&b'{') {
        return Err(AnnotationError::malformed(text, pos));
    }

    let mut depth = 1usize;
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if is_escape_pair(text, i) => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(AnnotationError::unbalanced(text, pos))
}

/// Returns the text strictly between the `{` at `pos` and its matching `}`.
///
/// Escapes are preserved as written.
pub fn content(text: &str, pos: usize) -> AnnotationResult<&str> {
    let end = scan(text, pos)?;
    Ok(&text[pos + 1..end - 1])
}

/// Returns the offset one past the `]` closing an optional argument at `pos`.
///
/// Optional arguments do not nest, so this is the first `]` after `pos`.
pub fn scan_optional(text: &str, pos: usize) -> Option<usize> {
    if !text[pos..].starts_with('[') {
        return None;
    }
    text[pos + 1..].find(']').map(|close| pos + 1 + close + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_group() {
        let text = "{bracket without anything} but some text after";
        assert_eq!(scan(text, 0), Ok(26));
        assert_eq!(content(text, 0), Ok("bracket without anything"));
    }

    #[test]
    fn nested_groups() {
        let text = "{bracket {with} {two} inside} and text after";
        assert_eq!(scan(text, 0), Ok(29));
        assert_eq!(content(text, 0), Ok("bracket {with} {two} inside"));
    }

    #[test]
    fn escaped_braces_are_skipped() {
        let text = r"{bracket \{ and \} \{ \{ inside} after";
        assert_eq!(scan(text, 0), Ok(32));
    }

    #[test]
    fn escaped_backslash_before_brace() {
        // `\\` is an escape pair, so the following `}` closes the group.
        let text = r"{a\\}b";
        assert_eq!(scan(text, 0), Ok(5));
    }

    #[test]
    fn scan_from_inner_position() {
        let text = r"\emph{so \textbf{very} much}";
        assert_eq!(content(text, 16), Ok("very"));
        assert_eq!(content(text, 5), Ok(r"so \textbf{very} much"));
    }

    #[test]
    fn unbalanced_is_an_error() {
        let text = r"{\lemma{\sw{content}}";
        assert!(matches!(
            scan(text, 0),
            Err(AnnotationError::UnbalancedBrackets { offset: 0, .. })
        ));
    }

    #[test]
    fn scan_requires_opening_brace() {
        let err = scan("no brace here", 0).unwrap_err();
        assert_eq!(
            err,
            AnnotationError::MalformedInput {
                offset: 0,
                snippet: "no brace here".to_string()
            }
        );
    }

    #[test]
    fn unicode_content() {
        let text = "{ἀρχὴ {λόγος}} rest";
        let end = scan(text, 0).unwrap();
        assert_eq!(&text[end..], " rest");
    }

    #[test]
    fn optional_argument() {
        let text = "[persons]{Socrates}";
        assert_eq!(scan_optional(text, 0), Some(9));
        assert_eq!(scan_optional("[open", 0), None);
        assert_eq!(scan_optional("{x}", 0), None);
    }

    #[test]
    fn escape_pairs() {
        assert!(is_escape_pair(r"\&", 0));
        assert!(is_escape_pair(r"a\%", 1));
        assert!(!is_escape_pair(r"\emph", 0));
        assert!(!is_escape_pair(r"\", 0));
    }
}
