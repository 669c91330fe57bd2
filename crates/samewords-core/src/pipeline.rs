//! Entry points: annotate, clean or update a paragraph or a whole document.

use std::fmt;

use rayon::prelude::*;
use serde::Serialize;

use crate::annotate::{Annotator, Cleaner};
use crate::document::{split_document, split_paragraphs};
use crate::error::AnnotationResult;
use crate::settings::Settings;
use crate::tokenize::tokenize;

/// What to do with the text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Add wrappers.
    #[default]
    Annotate,
    /// Remove wrappers.
    Clean,
    /// Remove wrappers, then add them again.
    Update,
}

impl Method {
    /// The method name as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Annotate => "annotate",
            Self::Clean => "clean",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts gathered while processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Paragraphs processed.
    pub paragraphs: usize,
    /// Critical notes seen.
    pub notes: usize,
    /// Notes whose phrase recurred in context.
    pub annotated: usize,
    /// Wrappers inserted or given another level.
    pub wrapped: usize,
    /// Wrappers removed.
    pub removed: usize,
}

impl Stats {
    fn absorb(mut self, other: Self) -> Self {
        self.paragraphs += other.paragraphs;
        self.notes += other.notes;
        self.annotated += other.annotated;
        self.wrapped += other.wrapped;
        self.removed += other.removed;
        self
    }
}

/// A processed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Processed {
    /// The resulting text.
    pub text: String,
    /// What was done to it.
    pub stats: Stats,
}

/// Annotate one paragraph.
///
/// # Errors
///
/// Fails if the paragraph cannot be tokenized or a note lacks a required lemma.
pub fn annotate(text: &str, settings: &Settings) -> AnnotationResult<String> {
    process_paragraph(text, Method::Annotate, settings).map(|p| p.text)
}

/// Remove all wrappers from one paragraph.
///
/// # Errors
///
/// Fails if the paragraph cannot be tokenized.
pub fn clean(text: &str, settings: &Settings) -> AnnotationResult<String> {
    process_paragraph(text, Method::Clean, settings).map(|p| p.text)
}

/// Clean and then annotate one paragraph.
///
/// # Errors
///
/// Fails if the paragraph cannot be tokenized or a note lacks a required lemma.
pub fn update(text: &str, settings: &Settings) -> AnnotationResult<String> {
    process_paragraph(text, Method::Update, settings).map(|p| p.text)
}

/// Run `method` over one paragraph.
///
/// # Errors
///
/// Fails if the paragraph cannot be tokenized or a note lacks a required lemma.
pub fn process_paragraph(
    text: &str,
    method: Method,
    settings: &Settings,
) -> AnnotationResult<Processed> {
    let mut paragraph = tokenize(text, settings)?;
    let mut stats = Stats {
        paragraphs: 1,
        ..Stats::default()
    };
    if matches!(method, Method::Clean | Method::Update) {
        Cleaner::new(settings).clean(&mut paragraph, &mut stats)?;
    }
    if matches!(method, Method::Annotate | Method::Update) {
        Annotator::new(settings).annotate(&mut paragraph, &mut stats)?;
    }
    Ok(Processed {
        text: paragraph.write(),
        stats,
    })
}

/// Run `method` over every paragraph in the numbered sections of a document.
///
/// Paragraphs are processed in parallel and reassembled in order. Text
/// outside numbered sections is passed through.
///
/// # Errors
///
/// Returns the error of the first failing paragraph, with its offset relative
/// to the whole document.
#[tracing::instrument(skip_all, fields(method = %method, len = text.len()))]
pub fn process_document(
    text: &str,
    method: Method,
    settings: &Settings,
) -> AnnotationResult<Processed> {
    let mut segments = Vec::new();
    for chunk in split_document(text) {
        if !chunk.numbered {
            segments.push((chunk.text, chunk.offset, false));
            continue;
        }
        let mut offset = chunk.offset;
        for paragraph in split_paragraphs(chunk.text) {
            segments.push((paragraph, offset, true));
            offset += paragraph.len();
        }
    }

    let results: Vec<Processed> = segments
        .par_iter()
        .map(|&(segment, offset, numbered)| {
            if numbered {
                process_paragraph(segment, method, settings).map_err(|e| e.rebased(offset))
            } else {
                Ok(Processed {
                    text: segment.to_string(),
                    stats: Stats::default(),
                })
            }
        })
        .collect::<AnnotationResult<_>>()?;

    let processed = results
        .into_iter()
        .fold(Processed::default(), |mut acc, part| {
            acc.text.push_str(&part.text);
            acc.stats = acc.stats.absorb(part.stats);
            acc
        });
    tracing::info!(
        paragraphs = processed.stats.paragraphs,
        notes = processed.stats.notes,
        annotated = processed.stats.annotated,
        wrapped = processed.stats.wrapped,
        removed = processed.stats.removed,
        "document processed"
    );
    Ok(processed)
}
