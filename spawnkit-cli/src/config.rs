//! Configuration file support.
//!
//! The configuration is a TOML file. Unknown fields are ignored, a broken file at
//! the default location is reported but does not stop the command from running,
//! and settings are layered: defaults < config file < command-line arguments.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use etcetera::BaseStrategy;

use crate::args::CommandLineArgs;
use crate::error::CliError;
use crate::events::TraceEvent;

/// Grace period between the polite and the forced termination of a command that
/// outlived its timeout.
pub const DEFAULT_KILL_AFTER: Duration = Duration::from_secs(5);

/// Root configuration structure.
#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// How commands are launched and supervised.
    pub process: ProcessConfig,

    /// Environment variables given to every command. Variables passed with
    /// `--env` take precedence.
    pub env: BTreeMap<String, String>,

    /// Diagnostics.
    pub debug: DebugConfig,
}

/// Launch and supervision settings.
#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Working directory for commands.
    pub directory: Option<PathBuf>,

    /// Send the command's standard error wherever its standard output goes.
    #[serde(rename = "merge-outputs")]
    pub merge_outputs: Option<bool>,

    /// Seconds a command may run before it is asked to terminate.
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: Option<f64>,

    /// Seconds between asking a timed-out command to terminate and killing it.
    #[serde(rename = "kill-after-secs")]
    pub kill_after_secs: Option<f64>,
}

/// Diagnostic settings.
#[derive(Debug, Default, Clone, serde::Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Tracing events to enable in addition to those given with `--debug`.
    pub events: Vec<TraceEvent>,
}

/// The effective settings for one run, after layering.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Environment overrides, highest priority first.
    pub env: Vec<(String, String)>,
    /// Whether the command starts from an empty environment.
    pub clear_env: bool,
    /// Working directory, if not the current one.
    pub directory: Option<PathBuf>,
    /// Whether standard error follows standard output.
    pub merge_outputs: bool,
    /// How long the command may run.
    pub timeout: Option<Duration>,
    /// Grace period after a timeout before the command is killed.
    pub kill_after: Duration,
}

impl Config {
    /// Combines the configuration with the command-line arguments.
    ///
    /// Settings are applied with the following priority (highest to lowest):
    /// 1. CLI arguments
    /// 2. Config file values
    /// 3. Default values
    pub fn to_run_options(&self, args: &CommandLineArgs) -> Result<RunOptions, CliError> {
        let env = args
            .env
            .iter()
            .cloned()
            .chain(self.env.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect();

        let timeout = args
            .timeout_secs
            .or(self.process.timeout_secs)
            .map(|secs| to_duration("timeout", secs))
            .transpose()?;

        let kill_after = args
            .kill_after_secs
            .or(self.process.kill_after_secs)
            .map(|secs| to_duration("kill-after", secs))
            .transpose()?
            .unwrap_or(DEFAULT_KILL_AFTER);

        Ok(RunOptions {
            env,
            clear_env: args.clear_env,
            directory: args.directory.clone().or_else(|| self.process.directory.clone()),
            merge_outputs: merge_bool_setting(args.merge_outputs, false, self.process.merge_outputs),
            timeout,
            kill_after,
        })
    }
}

fn to_duration(name: &'static str, secs: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(secs).map_err(|_| CliError::InvalidDuration { name, value: secs })
}

/// Merges a boolean setting from CLI args, config file, and defaults.
///
/// Priority: CLI (if explicitly set) > config file > default.
///
/// Since boolean CLI flags can't distinguish between "explicitly set to false" and
/// "not provided" (both result in `false`), a CLI value that differs from the
/// default is taken as explicit.
const fn merge_bool_setting(cli_value: bool, cli_default: bool, config_value: Option<bool>) -> bool {
    if cli_value != cli_default {
        cli_value
    } else if let Some(config) = config_value {
        config
    } else {
        cli_default
    }
}

/// Result of attempting to load a configuration file.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration, or default if loading failed.
    pub config: Config,

    /// The path that was used (or attempted) for loading.
    pub path: Option<PathBuf>,

    /// Any error that occurred during loading.
    pub error: Option<ConfigLoadError>,

    /// Whether the path was explicitly provided by the user (via `--config`).
    /// If true and there's an error, the run should fail rather than continue.
    pub explicit_path: bool,
}

/// Errors that can occur when loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigLoadError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[source] std::io::Error),

    /// Failed to parse the TOML content.
    #[error("failed to parse config file: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Returns the default configuration file path for the current platform, or
/// `None` if the platform's config directory cannot be determined.
pub fn default_config_path() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("spawnkit").join("config.toml"))
}

/// Loads configuration from the specified path.
pub fn load_from_path(path: &Path) -> ConfigLoadResult {
    let (config, error) = match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(ConfigLoadError::Parse(e))),
        },
        Err(e) => (Config::default(), Some(ConfigLoadError::Io(e))),
    };

    ConfigLoadResult {
        config,
        path: Some(path.to_path_buf()),
        error,
        explicit_path: false,
    }
}

/// Loads configuration, either from `explicit_path` or from the default location.
/// A missing file at the default location is not an error.
pub fn load_config(disabled: bool, explicit_path: Option<&Path>) -> ConfigLoadResult {
    let defaults = |path| ConfigLoadResult {
        config: Config::default(),
        path,
        error: None,
        explicit_path: false,
    };

    if disabled {
        return defaults(None);
    }

    let path = match explicit_path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return defaults(None),
        },
    };

    if explicit_path.is_none() && !path.exists() {
        return defaults(Some(path));
    }

    let mut result = load_from_path(&path);
    result.explicit_path = explicit_path.is_some();
    result
}
