//! Macro invocations as they appear in the source.

use std::fmt;

use crate::brackets;
use crate::error::{AnnotationError, AnnotationResult};
use crate::token::BraceId;

/// Returns `true` for characters that make up words and macro names.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// One macro invocation: `\name`, an optional `[argument]` and maybe an
/// opening `{`.
///
/// Rendering a `Macro` reproduces exactly the bytes it was described from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    /// Name including the backslash, e.g. `\emph` or `\,`.
    pub name: String,
    /// Text between `[` and `]` directly after the name.
    pub optional: Option<String>,
    /// Whether a `{` directly follows the name and optional argument.
    pub opens_brace: bool,
    /// Whether the brace argument is `{}` or missing.
    pub is_content_empty: bool,
    /// Token distance from the token carrying this macro to the token with
    /// its closing brace. Zero for macros without a brace argument.
    pub to_closing: Option<usize>,
    /// Identity of the brace this macro opens.
    pub brace: Option<BraceId>,
    /// Byte offset of the backslash.
    pub offset: usize,
}

impl Macro {
    /// Describe the macro starting at the backslash at `pos`.
    ///
    /// # Errors
    ///
    /// [`AnnotationError::MalformedInput`] if `text[pos]` is not a backslash.
    pub fn describe(text: &str, pos: usize) -> AnnotationResult<Self> {
        if !text[pos..].starts_with('\\') {
            return Err(AnnotationError::malformed(text, pos));
        }
        let rest = &text[pos + 1..];
        let name_len = match rest.chars().next() {
            None => 0,
            Some(c) if is_word_char(c) => rest.find(|c| !is_word_char(c)).unwrap_or(rest.len()),
            Some(c) => c.len_utf8(),
        };
        let mut end = pos + 1 + name_len;
        let name = text[pos..end].to_string();

        let optional = brackets::scan_optional(text, end).map(|close| {
            let arg = text[end + 1..close - 1].to_string();
            end = close;
            arg
        });

        let opens_brace = text[end..].starts_with('{');
        let is_content_empty = !opens_brace || text[end + 1..].starts_with('}');
        Ok(Self {
            name,
            optional,
            opens_brace,
            is_content_empty,
            to_closing: (!opens_brace).then_some(0),
            brace: None,
            offset: pos,
        })
    }

    /// A new disambiguation wrapper carrying `levels`.
    pub(crate) fn wrapper(name: &str, levels: &[usize], brace: BraceId, offset: usize) -> Self {
        Self {
            name: name.to_string(),
            optional: render_levels(levels),
            opens_brace: true,
            is_content_empty: false,
            to_closing: None,
            brace: Some(brace),
            offset,
        }
    }

    /// Byte length of the macro as written.
    pub fn source_len(&self) -> usize {
        self.name.len()
            + self.optional.as_ref().map_or(0, |arg| arg.len() + 2)
            + usize::from(self.opens_brace)
    }

    /// Nesting levels recorded in the optional argument, sorted.
    ///
    /// Entries that are not integers are dropped.
    pub fn levels(&self) -> Vec<usize> {
        let mut levels: Vec<usize> = self
            .optional
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|level| level.trim().parse().ok())
            .collect();
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    /// Add `level` to the optional argument. Level zero means "untagged".
    pub fn merge_level(&mut self, level: usize) {
        if level == 0 {
            return;
        }
        let mut levels = self.levels();
        if !levels.contains(&level) {
            levels.push(level);
            levels.sort_unstable();
            self.optional = render_levels(&levels);
        }
    }
}

fn render_levels(levels: &[usize]) -> Option<String> {
    (!levels.is_empty()).then(|| {
        levels
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    })
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(ref arg) = self.optional {
            write!(f, "[{arg}]")?;
        }
        if self.opens_brace {
            f.write_str("{")?;
        }
        Ok(())
    }
}
