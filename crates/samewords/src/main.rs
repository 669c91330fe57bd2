//! samewords CLI
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use samewords::{Cli, Commands, commands};
use samewords_core::Method;
use samewords_core::config::{Config, ConfigLoader, ConfigSources};
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if cli.version_only {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    // clap prints help when neither a command nor --version-only is given
    let Some(command) = cli.command else {
        return Ok(());
    };

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }
    let (config, sources) = load_config(cli.config.as_deref())?;

    let log_dir = config.log_dir.as_ref().map(|dir| dir.as_std_path().to_path_buf());
    let logging = observability::ObservabilityConfig::from_env_with_overrides(log_dir);
    let filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&logging, filter)
        .context("failed to initialize logging/tracing")?;
    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        chdir = ?cli.chdir,
        config_file = ?sources.primary_file(),
        "starting"
    );

    let limit = input_limit(&config);
    let run = |args, method| commands::process::cmd_process(args, method, cli.json, &config, limit);
    let result = match command {
        Commands::Annotate(args) => run(args, Method::Annotate),
        Commands::Clean(args) => run(args, Method::Clean),
        Commands::Update(args) => run(args, Method::Update),
        Commands::Info(args) => commands::info::cmd_info(args, cli.json, &config, &sources),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}

/// Config for the working directory, plus the `--config` file if given.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Config, ConfigSources)> {
    let cwd = utf8(std::env::current_dir().context("failed to determine current directory")?)
        .context("current directory is not valid UTF-8")?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(path) = explicit {
        let path = utf8(path.to_path_buf()).context("config path is not valid UTF-8")?;
        loader = loader.with_file(path);
    }
    loader.load().context("failed to load configuration")
}

fn utf8(path: PathBuf) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path)
        .map_err(|e| anyhow::anyhow!("{}", e.into_path_buf().display()))
}

/// Largest document the commands will read, `None` when unlimited.
fn input_limit(config: &Config) -> Option<usize> {
    if config.disable_input_limit {
        return None;
    }
    Some(
        config
            .max_input_bytes
            .unwrap_or(samewords_core::DEFAULT_MAX_INPUT_BYTES),
    )
}
