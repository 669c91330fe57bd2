//! Info command implementation

use clap::Args;
use owo_colors::OwoColorize;
use samewords_core::config::{Config, ConfigSources};
use serde::Serialize;
use tracing::{debug, instrument};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_input_bytes: Option<usize>,
    context_distance: usize,
    sensitive_context_match: bool,
    lemma_required: bool,
    exclude_macros: &'a [String],
    include_macros: &'a [String],
    ellipsis_patterns: &'a [String],
    punctuation: &'a str,
}

impl<'a> ConfigInfo<'a> {
    fn from_config(config: &'a Config, sources: &ConfigSources) -> Self {
        let max_input_bytes = if config.disable_input_limit {
            None
        } else {
            Some(
                config
                    .max_input_bytes
                    .unwrap_or(samewords_core::DEFAULT_MAX_INPUT_BYTES),
            )
        };
        Self {
            config_file: sources.primary_file().map(|p| p.to_string()),
            log_level: config.log_level.as_str(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            max_input_bytes,
            context_distance: config.context_distance,
            sensitive_context_match: config.sensitive_context_match,
            lemma_required: config.lemma_required,
            exclude_macros: &config.exclude_macros,
            include_macros: &config.include_macros,
            ellipsis_patterns: &config.ellipsis_patterns,
            punctuation: &config.punctuation,
        }
    }
}

#[derive(Serialize)]
struct FullInfo<'a> {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo<'a>,
}

/// Print package information and the effective configuration.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    sources: &ConfigSources,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, sources),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", info.package.name.bold(), info.package.version.green());
    if !info.package.description.is_empty() {
        println!("{}", info.package.description);
    }
    if !info.package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), info.package.license);
    }
    if !info.package.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), info.package.repository.cyan());
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    match info.config.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), info.config.log_level);
    if let Some(ref dir) = info.config.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }
    match info.config.max_input_bytes {
        Some(max) => println!("{}: {max} bytes", "Input limit".dimmed()),
        None => println!("{}: {}", "Input limit".dimmed(), "disabled".yellow()),
    }

    println!();
    println!("{}", "Matching".bold().underline());
    println!("{}: {}", "Context distance".dimmed(), info.config.context_distance);
    println!(
        "{}: {}",
        "Case sensitive".dimmed(),
        info.config.sensitive_context_match
    );
    println!("{}: {}", "Lemma required".dimmed(), info.config.lemma_required);
    print_list("Excluded macros", info.config.exclude_macros);
    print_list("Included macros", info.config.include_macros);
    print_list("Ellipsis patterns", info.config.ellipsis_patterns);
    println!("{}: {}", "Punctuation".dimmed(), info.config.punctuation);

    Ok(())
}

fn print_list(label: &str, values: &[String]) {
    if values.is_empty() {
        println!("{}: {}", label.dimmed(), "(none)".dimmed());
    } else {
        println!("{}: {}", label.dimmed(), values.join(" "));
    }
}
