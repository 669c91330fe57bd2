//! Configuration loading and discovery.
//!
//! Matching options (macro lists, ellipsis patterns, punctuation, context
//! distance) and CLI housekeeping live in one [`Config`] record. It is
//! assembled from the built-in lists, a per-user file, files found beside the
//! edition and `SAMEWORDS_*` variables.
//!
//! # Supported formats
//!
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`), which also reads legacy `samewords` JSON configs
//!
//! # Config file locations (in order of precedence, highest first):
//! - `samewords.<ext>` in current directory or any parent
//! - `.samewords.<ext>` in current directory or any parent
//! - `~/.config/samewords/config.<ext>` (user config)
//!
//! Scalar keys from a later file replace earlier values. The macro and
//! ellipsis lists are appended to instead, so a config file only has to name
//! what it adds to the built-in lists.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use samewords_core::config::ConfigLoader;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let (config, _sources) = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::settings::{
    DEFAULT_CONTEXT_DISTANCE, DEFAULT_ELLIPSIS_PATTERNS, DEFAULT_EXCLUDE_MACROS,
    DEFAULT_INCLUDE_MACROS, DEFAULT_PUNCTUATION,
};

/// The configuration for samewords.
///
/// Deserialized from config files found during discovery (TOML, YAML, or
/// JSON). Compile it into [`Settings`](crate::Settings) before processing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files. No log file is written when unset.
    pub log_dir: Option<Utf8PathBuf>,
    /// Maximum input size in bytes (default: 5 MiB).
    pub max_input_bytes: Option<usize>,
    /// Disable the input size limit entirely.
    pub disable_input_limit: bool,
    /// Macros whose argument is hidden from word matching.
    pub exclude_macros: Vec<String>,
    /// Macros whose argument is part of the word they follow.
    pub include_macros: Vec<String>,
    /// Regular expressions that mark an ellipsis lemma.
    pub ellipsis_patterns: Vec<String>,
    /// Match words with the same case only.
    pub sensitive_context_match: bool,
    /// Number of words searched on each side of a note.
    pub context_distance: usize,
    /// Characters treated as punctuation between words.
    pub punctuation: String,
    /// Fail on notes whose apparatus has no `\lemma`.
    pub lemma_required: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_dir: None,
            max_input_bytes: None,
            disable_input_limit: false,
            exclude_macros: owned(DEFAULT_EXCLUDE_MACROS),
            include_macros: owned(DEFAULT_INCLUDE_MACROS),
            ellipsis_patterns: owned(DEFAULT_ELLIPSIS_PATTERNS),
            sensitive_context_match: false,
            context_distance: DEFAULT_CONTEXT_DISTANCE,
            punctuation: DEFAULT_PUNCTUATION.to_string(),
            lemma_required: true,
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// Default verbosity of the CLI's logs.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-note decisions, including skipped notes.
    Debug,
    /// One summary per processed document.
    #[default]
    Info,
    /// Problems that did not stop processing.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// The level as an `EnvFilter` directive.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// The files that contributed to a [`Config`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigSources {
    /// `.samewords.*` and `samewords.*` beside the edition, dotfiles first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub project_files: Vec<Utf8PathBuf>,
    /// `config.*` in the per-user samewords directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_file: Option<Utf8PathBuf>,
    /// Files named with `--config`, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigSources {
    /// The file whose values won, for display in `info`.
    pub fn primary_file(&self) -> Option<&Utf8Path> {
        self.explicit_files
            .last()
            .map(Utf8PathBuf::as_path)
            .or_else(|| self.project_files.last().map(Utf8PathBuf::as_path))
            .or(self.user_file.as_deref())
    }
}

/// Extensions tried for every config file name, in this order.
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Stem of project config names and the per-user directory.
const APP_NAME: &str = "samewords";

/// Collects the config files for a run and merges them into a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Directory the project search starts from, usually the working directory.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether the per-user file takes part.
    include_user_config: bool,
    /// Entry that marks the top of an edition's repository.
    boundary_marker: Option<String>,
    /// Files from `--config`.
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// A loader that reads the per-user file and stops at `.git`.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Search for project files from `path` upwards.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Include or skip `~/.config/samewords/config.*`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Stop the upward search in the directory holding `marker`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Search up to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Merge `path` after every discovered file.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Merge defaults, the per-user file, project files, `--config` files and
    /// `SAMEWORDS_*` variables, each overriding the ones before.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Deserialize`] if a file cannot be parsed or a value has
    /// the wrong type.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<(Config, ConfigSources)> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let mut sources = ConfigSources::default();

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
            sources.user_file = Some(user_config);
        }

        if let Some(ref root) = self.project_search_root {
            let project_configs = self.find_project_configs(root);
            for pc in &project_configs {
                figment = Self::merge_file(figment, pc);
            }
            sources.project_files = project_configs;
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }
        sources.explicit_files = self.explicit_files;

        // SAMEWORDS_CONTEXT_DISTANCE=30, SAMEWORDS_LOG_LEVEL=debug, etc.
        figment = figment.merge(Env::prefixed("SAMEWORDS_").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            context_distance = config.context_distance,
            sensitive_context_match = config.sensitive_context_match,
            "configuration loaded"
        );
        Ok((config, sources))
    }

    /// Like [`load`](Self::load), but fails with [`ConfigError::NotFound`]
    /// when no file at all would be read.
    pub fn load_or_error(self) -> ConfigResult<(Config, ConfigSources)> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .is_some_and(|root| !self.find_project_configs(root).is_empty());
        let has_explicit = !self.explicit_files.is_empty();

        if !has_user && !has_project && !has_explicit {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Config files in the nearest directory at or above `start` that has any.
    fn find_project_configs(&self, start: &Utf8Path) -> Vec<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            let mut found = Vec::new();

            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    found.push(dotfile);
                }
            }
            for ext in CONFIG_EXTENSIONS {
                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    found.push(regular);
                }
            }

            if !found.is_empty() {
                return found;
            }

            // Checked after the config files so a config beside the marker is found.
            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
                && dir != start
            {
                break;
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        Vec::new()
    }

    /// The first `config.<ext>` in the per-user directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Add `path` to the figment, parsed by extension. `admerge` appends list
    /// keys, so a file only names the macros and patterns it adds.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.admerge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.admerge(Json::file_exact(path.as_str())),
            _ => figment.admerge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Platform directories for samewords.
fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Where the per-user `config.*` lives, e.g. `~/.config/samewords/` on Linux.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serializes tests that mutate environment variables.
    static TEST_ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn load_file(name: &str, body: &str) -> Config {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(name);
        fs::write(&config_path, body).unwrap();
        let config_path = Utf8PathBuf::try_from(config_path).unwrap();

        let (config, _sources) = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&config_path)
            .load()
            .unwrap();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert_eq!(config.context_distance, 20);
        assert!(config.lemma_required);
        assert!(!config.sensitive_context_match);
        assert!(config.exclude_macros.iter().any(|m| m == r"\Afootnote"));
    }

    #[test]
    fn test_loader_builds_with_defaults() {
        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load()
            .unwrap();
        assert_eq!(config, Config::default());
        assert!(sources.primary_file().is_none());
    }

    #[test]
    fn test_scalars_override_defaults() {
        let config = load_file(
            "config.toml",
            r#"log_level = "debug"
log_dir = "/tmp/samewords"
context_distance = 30
sensitive_context_match = true
lemma_required = false
"#,
        );
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.log_dir.as_deref().map(Utf8Path::as_str), Some("/tmp/samewords"));
        assert_eq!(config.context_distance, 30);
        assert!(config.sensitive_context_match);
        assert!(!config.lemma_required);
    }

    #[test]
    fn test_lists_extend_defaults() {
        let config = load_file(
            "config.toml",
            r#"exclude_macros = ['\ledsidenote']
ellipsis_patterns = ['\.\.\.']
"#,
        );
        assert!(config.exclude_macros.iter().any(|m| m == r"\Afootnote"));
        assert!(config.exclude_macros.iter().any(|m| m == r"\ledsidenote"));
        assert_eq!(
            config.ellipsis_patterns.len(),
            DEFAULT_ELLIPSIS_PATTERNS.len() + 1
        );
    }

    #[test]
    fn test_legacy_json_config() {
        let config = load_file(
            "samewords_conf.json",
            r#"{
    "ellipsis_patterns": ["\\.\\.\\."],
    "exclude_macros": ["\\ledsidenote"],
    "sensitive_context_match": true
}"#,
        );
        assert!(config.sensitive_context_match);
        assert!(config.ellipsis_patterns.iter().any(|p| p == r"\.\.\."));
        assert!(config.exclude_macros.iter().any(|m| m == r"\ledsidenote"));
    }

    #[test]
    fn test_yaml_config() {
        let config = load_file("config.yaml", "context_distance: 5\ninclude_macros: ['\\name']\n");
        assert_eq!(config.context_distance, 5);
        assert!(config.include_macros.iter().any(|m| m == r"\index"));
        assert!(config.include_macros.iter().any(|m| m == r"\name"));
    }

    #[test]
    fn test_config_serializes_to_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("context_distance: 20"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, Config::default());
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();

        let base_config = tmp.path().join("base.toml");
        fs::write(&base_config, "context_distance = 10").unwrap();

        let override_config = tmp.path().join("override.toml");
        fs::write(&override_config, "context_distance = 40").unwrap();

        let base_config = Utf8PathBuf::try_from(base_config).unwrap();
        let override_config = Utf8PathBuf::try_from(override_config).unwrap();

        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&base_config)
            .with_file(&override_config)
            .load()
            .unwrap();

        assert_eq!(config.context_distance, 40);
        assert_eq!(sources.primary_file(), Some(override_config.as_path()));
    }

    #[test]
    fn test_project_config_discovery() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("edition");
        let sub_dir = project_dir.join("text").join("book1");
        fs::create_dir_all(&sub_dir).unwrap();

        fs::write(project_dir.join(".samewords.toml"), r#"log_level = "debug""#).unwrap();

        let sub_dir = Utf8PathBuf::try_from(sub_dir).unwrap();

        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(&sub_dir)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(sources.project_files.len(), 1);
    }

    #[test]
    fn test_regular_file_wins_over_dotfile() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".samewords.toml"), "context_distance = 3").unwrap();
        fs::write(tmp.path().join("samewords.toml"), "context_distance = 7").unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();

        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(&root)
            .load()
            .unwrap();

        assert_eq!(config.context_distance, 7);
        assert_eq!(sources.project_files.len(), 2);
    }

    #[test]
    fn test_boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();

        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();

        fs::write(parent.join(".samewords.toml"), r#"log_level = "warn""#).unwrap();
        fs::create_dir(child.join(".git")).unwrap();

        let work = Utf8PathBuf::try_from(work).unwrap();

        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .with_boundary_marker(".git")
            .with_project_search(&work)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
        assert!(sources.project_files.is_empty());
    }

    #[test]
    fn test_load_or_error_fails_when_no_config() {
        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load_or_error();

        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_invalid_value_is_a_deserialize_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, r#"context_distance = "far""#).unwrap();
        let config_path = Utf8PathBuf::try_from(config_path).unwrap();

        let result = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&config_path)
            .load();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn test_user_config_dir() {
        if let Some(path) = user_config_dir() {
            assert!(path.as_str().contains("samewords"));
        }
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_env_var_overrides_file_config() {
        let _lock = TEST_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "context_distance = 12").unwrap();
        let config_path = Utf8PathBuf::try_from(config_path).unwrap();

        // SAFETY: Test environment; the mutex serializes env access across tests.
        unsafe {
            std::env::set_var("SAMEWORDS_CONTEXT_DISTANCE", "33");
        }

        let result = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&config_path)
            .load();

        // SAFETY: Cleanup after test.
        unsafe {
            std::env::remove_var("SAMEWORDS_CONTEXT_DISTANCE");
        }

        let (config, _sources) = result.unwrap();
        assert_eq!(config.context_distance, 33);
    }
}
