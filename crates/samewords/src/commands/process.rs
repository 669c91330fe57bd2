//! The annotate, clean and update commands.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use samewords_core::config::Config;
use samewords_core::{Method, Settings, Stats, process_document};
use serde::Serialize;
use tracing::{debug, instrument};

/// Arguments shared by `annotate`, `clean` and `update`.
#[derive(Args, Debug, Default)]
pub struct ProcessArgs {
    /// LaTeX document to process
    pub file: Utf8PathBuf,

    /// Write the result here instead of stdout (a directory keeps the input's file name)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Overwrite an existing output file
    #[arg(long)]
    pub force: bool,

    /// Match words case-sensitively
    #[arg(long)]
    pub case_sensitive: bool,

    /// Words searched on each side of a note
    #[arg(long, value_name = "N")]
    pub context_distance: Option<usize>,

    /// Use the note's own text when it has no \lemma
    #[arg(long)]
    pub allow_missing_lemma: bool,

    /// Macro whose argument is never searched (repeatable)
    #[arg(long, value_name = "NAME")]
    pub exclude_macro: Vec<String>,

    /// Regex marking an ellipsis in a lemma (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub ellipsis_pattern: Vec<String>,
}

impl ProcessArgs {
    /// Compile the settings for this run: the configuration plus flag overrides.
    pub fn settings(&self, config: &Config) -> anyhow::Result<Settings> {
        let mut config = config.clone();
        config.exclude_macros.extend(self.exclude_macro.iter().cloned());
        config
            .ellipsis_patterns
            .extend(self.ellipsis_pattern.iter().cloned());
        config.sensitive_context_match |= self.case_sensitive;
        if let Some(distance) = self.context_distance {
            config.context_distance = distance;
        }
        if self.allow_missing_lemma {
            config.lemma_required = false;
        }
        Settings::from_config(&config).context("invalid settings")
    }

    /// Where the result goes, or `None` for stdout.
    fn destination(&self) -> Option<Utf8PathBuf> {
        let output = self.output.as_ref()?;
        if output.is_dir() {
            let name = self.file.file_name().unwrap_or("output.tex");
            Some(output.join(name))
        } else {
            Some(output.clone())
        }
    }
}

#[derive(Serialize)]
struct Report {
    method: Method,
    file: Utf8PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<Utf8PathBuf>,
    stats: Stats,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Run `method` over a document and write or print the result.
#[instrument(name = "cmd_process", skip_all, fields(method = %method, file = %args.file))]
pub fn cmd_process(
    args: ProcessArgs,
    method: Method,
    global_json: bool,
    config: &Config,
    max_input_bytes: Option<usize>,
) -> anyhow::Result<()> {
    let settings = args.settings(config)?;
    let destination = args.destination();
    if let Some(ref path) = destination
        && path.exists()
        && !args.force
    {
        anyhow::bail!("{path} already exists (use --force to overwrite)");
    }

    let input = super::read_input_file(&args.file, max_input_bytes)?;
    debug!(bytes = input.len(), "read input");

    let processed = process_document(&input, method, &settings).map_err(|err| {
        let (line, column) = line_column(&input, err.offset());
        anyhow::Error::new(err).context(format!(
            "failed to {method} {}:{line}:{column}",
            args.file
        ))
    })?;

    if let Some(ref path) = destination {
        write_output(path, &processed.text)?;
    }

    if global_json {
        let report = Report {
            method,
            file: args.file,
            output: destination.clone(),
            stats: processed.stats,
            text: destination.is_none().then_some(processed.text),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(ref path) = destination {
        print_summary(method, path, &processed.stats);
    } else {
        print!("{}", processed.text);
    }
    Ok(())
}

fn write_output(path: &Utf8Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {parent}"))?;
    }
    std::fs::write(path, text).with_context(|| format!("failed to write {path}"))
}

fn print_summary(method: Method, path: &Utf8Path, stats: &Stats) {
    println!("{} {}", method.as_str().bold(), path.cyan());
    println!(
        "{}: {}  {}: {}  {}: {}",
        "paragraphs".dimmed(),
        stats.paragraphs,
        "notes".dimmed(),
        stats.notes,
        "annotated".dimmed(),
        stats.annotated
    );
    if stats.removed > 0 {
        println!("{}: {}", "wrappers removed".dimmed(), stats.removed);
    }
    if stats.wrapped > 0 {
        println!("{}: {}", "wrappers added".dimmed(), stats.wrapped.green());
    }
}

/// One-based line and column of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}
