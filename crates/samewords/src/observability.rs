//! Logging setup: a stderr layer for people and an optional JSONL file layer
//! for later inspection.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_PATH_ENV: &str = "SAMEWORDS_LOG_PATH";
const LOG_DIR_ENV: &str = "SAMEWORDS_LOG_DIR";
const LOG_FILE_NAME: &str = "samewords.jsonl";

/// Where log records go.
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    /// JSONL log file, if any.
    pub log_file: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Resolve the log file from the environment, falling back to `log_dir`.
    ///
    /// `SAMEWORDS_LOG_PATH` names the file itself and wins over
    /// `SAMEWORDS_LOG_DIR`, which wins over the configured directory.
    pub fn from_env_with_overrides(log_dir: Option<PathBuf>) -> Self {
        let from_env = |name: &str| {
            std::env::var_os(name)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };
        let log_file = from_env(LOG_PATH_ENV).or_else(|| {
            from_env(LOG_DIR_ENV)
                .or(log_dir)
                .map(|dir| dir.join(LOG_FILE_NAME))
        });
        Self { log_file }
    }
}

/// Build the event filter from the CLI flags.
///
/// `RUST_LOG` wins when set. Otherwise `-q` shows errors only, `-v` debug,
/// `-vv` trace, and without flags the configured level applies.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => default_level,
            1 => "debug",
            _ => "trace",
        }
    };
    EnvFilter::new(level)
}

/// Install the global subscriber.
///
/// The stderr layer shows warnings and errors unless the filter enables
/// debug or trace. The returned guard flushes the file writer and must be held until
/// the program exits.
pub fn init_observability(
    config: &ObservabilityConfig,
    filter: EnvFilter,
) -> anyhow::Result<Option<WorkerGuard>> {
    // Info stays in the log file; stderr only gets chattier for debug and trace.
    let stderr_level = filter
        .max_level_hint()
        .filter(|hint| *hint > LevelFilter::INFO)
        .unwrap_or(LevelFilter::WARN);
    let stderr = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_level);

    let (file, guard) = match config.log_file {
        Some(ref path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), PathBuf::from);
            std::fs::create_dir_all(&dir)?;
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log path has no file name: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(&dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_dir_gets_default_file_name() {
        if std::env::var_os(LOG_PATH_ENV).is_some() || std::env::var_os(LOG_DIR_ENV).is_some() {
            return;
        }
        let config = ObservabilityConfig::from_env_with_overrides(Some(PathBuf::from("/tmp/logs")));
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/logs/samewords.jsonl")));
    }

    #[test]
    fn no_location_means_no_file() {
        if std::env::var_os(LOG_PATH_ENV).is_some() || std::env::var_os(LOG_DIR_ENV).is_some() {
            return;
        }
        assert!(ObservabilityConfig::from_env_with_overrides(None).log_file.is_none());
    }
}
