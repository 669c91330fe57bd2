//! The read-only settings snapshot handed to the tokenizer and annotator.

use std::collections::HashSet;

use regex::Regex;

use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};

/// The critical note macro: `\edtext{main text}{apparatus}`.
pub const NOTE_MACRO: &str = r"\edtext";

/// The lemma macro inside an apparatus note.
pub const LEMMA_MACRO: &str = r"\lemma";

/// The disambiguation wrapper.
pub const SAMEWORD_MACRO: &str = r"\sameword";

/// Macros whose argument never counts as words.
pub const DEFAULT_EXCLUDE_MACROS: &[&str] = &[
    r"\Afootnote",
    r"\Bfootnote",
    r"\Cfootnote",
    r"\Dfootnote",
    r"\Efootnote",
    r"\lemma",
    r"\applabel",
    r"\sidenote",
];

/// Macros whose argument is part of the word they follow.
pub const DEFAULT_INCLUDE_MACROS: &[&str] = &[r"\index"];

/// Patterns marking an elided lemma such as `a \dots{} c`.
pub const DEFAULT_ELLIPSIS_PATTERNS: &[&str] = &[r"\\l?dots", "-+", "–", "—"];

/// Characters that never belong to a word.
pub const DEFAULT_PUNCTUATION: &str = "!\"#$&'()*+,-./:;<=>?@[]^`|~–—“”‘’«»„…";

/// Default number of words searched on each side of a note.
pub const DEFAULT_CONTEXT_DISTANCE: usize = 20;

/// Immutable settings for one run.
///
/// Built once from a [`Config`] and shared by reference between paragraphs,
/// including across worker threads.
#[derive(Debug, Clone)]
pub struct Settings {
    exclude_macros: HashSet<String>,
    include_macros: HashSet<String>,
    ellipsis: Option<Regex>,
    punctuation: HashSet<char>,
    case_sensitive: bool,
    context_distance: usize,
    lemma_required: bool,
}

impl Settings {
    /// Compile the settings described by `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidPattern`] if an ellipsis pattern is not a valid
    /// regular expression.
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let patterns = config
            .ellipsis_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map(|_| format!("(?:{pattern})"))
                    .map_err(|source| ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        source: Box::new(source),
                    })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        let ellipsis = if patterns.is_empty() {
            None
        } else {
            let joined = patterns.join("|");
            let regex = Regex::new(&joined).map_err(|source| ConfigError::InvalidPattern {
                pattern: joined.clone(),
                source: Box::new(source),
            })?;
            Some(regex)
        };

        Ok(Self {
            exclude_macros: normalize_macros(&config.exclude_macros),
            include_macros: normalize_macros(&config.include_macros),
            ellipsis,
            punctuation: config
                .punctuation
                .chars()
                .filter(|c| !matches!(c, '{' | '}' | '\\' | '%'))
                .collect(),
            case_sensitive: config.sensitive_context_match,
            context_distance: config.context_distance,
            lemma_required: config.lemma_required,
        })
    }

    /// Set whether words must match with the same case.
    #[must_use]
    pub const fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Set how many words are searched on each side of a note.
    #[must_use]
    pub const fn with_context_distance(mut self, distance: usize) -> Self {
        self.context_distance = distance;
        self
    }

    /// Set whether notes without a `\lemma` are an error.
    #[must_use]
    pub const fn with_lemma_required(mut self, required: bool) -> Self {
        self.lemma_required = required;
        self
    }

    /// Whether words must match with the same case.
    pub const fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Words searched on each side of a note.
    pub const fn context_distance(&self) -> usize {
        self.context_distance
    }

    /// Whether notes without a `\lemma` are an error.
    pub const fn lemma_required(&self) -> bool {
        self.lemma_required
    }

    /// Whether the argument of `name` is hidden from word matching.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_macros.contains(name)
    }

    /// Whether the argument of `name` counts as part of the preceding word.
    pub fn is_included(&self, name: &str) -> bool {
        self.include_macros.contains(name)
    }

    /// Whether `c` is configured punctuation.
    pub fn is_punctuation(&self, c: char) -> bool {
        self.punctuation.contains(&c)
    }

    /// Whether `text` contains an ellipsis marker.
    pub fn has_ellipsis(&self, text: &str) -> bool {
        self.ellipsis.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// Apply the configured case rule to a word.
    pub fn fold(&self, word: String) -> String {
        if self.case_sensitive {
            word
        } else {
            word.to_lowercase()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Config::default()).expect("built-in settings are valid")
    }
}

fn normalize_macros(names: &[String]) -> HashSet<String> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| {
            if name.starts_with('\\') {
                name.to_string()
            } else {
                format!("\\{name}")
            }
        })
        .collect()
}
