//! Core library for samewords.
//!
//! Samewords marks repeated words around the critical notes of a reledmac
//! edition. When the lemma of an `\edtext` note also occurs close by in the
//! main text, every occurrence is wrapped in `\sameword`, so the printed
//! apparatus can tell which one the note refers to.
//!
//! # Modules
//!
//! - [`tokenize`] - Position-preserving tokenizer and the note registry
//! - [`annotate`] - Adding and removing `\sameword` wrappers
//! - [`pipeline`] - Paragraph and document entry points
//! - [`document`] - Finding the numbered paragraphs of a document
//! - [`config`] - Configuration loading and management
//! - [`settings`] - The compiled settings the core runs with
//! - [`error`] - Error types and result aliases
//!
//! # Quick Start
//!
//! ```
//! use samewords_core::{Settings, annotate};
//!
//! let settings = Settings::default();
//! let text = r"so \edtext{so}{\lemma{so}\Bfootnote{sic B}}";
//! let annotated = annotate(text, &settings).unwrap();
//! assert_eq!(
//!     annotated,
//!     r"\sameword{so} \edtext{\sameword[1]{so}}{\lemma{\sameword{so}}\Bfootnote{sic B}}"
//! );
//! ```
#![deny(unsafe_code)]

pub mod annotate;
pub mod brackets;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod macros;
pub mod matcher;
pub mod phrase;
pub mod pipeline;
pub mod settings;
pub mod token;
pub mod tokenize;
pub mod wrap;

pub use config::{Config, ConfigLoader, ConfigSources, LogLevel};

pub use error::{AnnotationError, AnnotationResult, ConfigError, ConfigResult};

pub use pipeline::{Method, Processed, Stats, annotate, clean, process_document, update};

pub use settings::Settings;

/// Default maximum input size: 5 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 5 * 1024 * 1024;
