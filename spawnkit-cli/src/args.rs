//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::events;

const SHORT_DESCRIPTION: &str = "Run a command with controlled stdio, environment, and lifetime";

const LONG_DESCRIPTION: &str = r"
spawnkit runs a single command as a child process. Its standard streams are
inherited from spawnkit unless redirected to files; environment variables and the
working directory can be overridden; and an optional timeout terminates the
command, politely first and forcibly after a grace period.

The exit code is the command's own. A command killed by a signal reports 128 plus
the signal number; a command that cannot be found reports 127, and one that cannot
be executed reports 126.
";

/// Parsed command-line arguments.
#[derive(Parser, Debug)]
#[clap(name = "spawnkit", version, about = SHORT_DESCRIPTION, long_about = LONG_DESCRIPTION)]
#[allow(clippy::module_name_repetitions)]
pub struct CommandLineArgs {
    /// Set an environment variable for the command; may be repeated.
    #[clap(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Start the command from an empty environment instead of a copy of this one.
    #[clap(long = "clear-env")]
    pub clear_env: bool,

    /// Run the command in this directory.
    #[clap(short = 'C', long = "directory", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Send the command's standard error wherever its standard output goes.
    #[clap(long = "merge-outputs")]
    pub merge_outputs: bool,

    /// Read the command's standard input from this file.
    #[clap(long = "stdin", value_name = "FILE")]
    pub stdin: Option<PathBuf>,

    /// Write the command's standard output to this file, replacing its contents.
    #[clap(long = "stdout", value_name = "FILE")]
    pub stdout: Option<PathBuf>,

    /// Write the command's standard error to this file, replacing its contents.
    #[clap(long = "stderr", value_name = "FILE")]
    pub stderr: Option<PathBuf>,

    /// Ask the command to terminate after this many seconds.
    #[clap(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<f64>,

    /// Kill a timed-out command if it is still running this many seconds after it
    /// was asked to terminate [default: 5].
    #[clap(long = "kill-after", value_name = "SECS")]
    pub kill_after_secs: Option<f64>,

    /// Enable debug logging for classes of tracing events.
    #[clap(long = "debug", value_name = "EVENT")]
    pub enabled_debug_events: Vec<events::TraceEvent>,

    /// Path to a configuration file (default: `<config-dir>/spawnkit/config.toml`).
    #[clap(long = "config", value_name = "FILE", env = "SPAWNKIT_CONFIG", conflicts_with = "no_config")]
    pub config_file: Option<PathBuf>,

    /// Skip loading the configuration file.
    #[clap(long = "no-config")]
    pub no_config: bool,

    /// The command to run, followed by its arguments.
    #[clap(required = true, trailing_var_arg = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("missing variable name in '{s}'")),
        Some((key, value)) => Ok((key.to_owned(), value.to_owned())),
        None => Err(format!("expected KEY=VALUE, found '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_and_arguments_are_captured() {
        let args = CommandLineArgs::try_parse_from(["spawnkit", "--merge-outputs", "sh", "-c", "exit 3"]).unwrap();

        assert!(args.merge_outputs);
        assert_eq!(args.command, vec!["sh", "-c", "exit 3"]);
    }

    #[test]
    fn env_pairs_are_split_on_first_equals() {
        let args = CommandLineArgs::try_parse_from(["spawnkit", "-e", "A=b=c", "--env", "EMPTY=", "true"]).unwrap();

        assert_eq!(
            args.env,
            vec![
                ("A".to_string(), "b=c".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn malformed_env_pair_is_rejected() {
        assert!(CommandLineArgs::try_parse_from(["spawnkit", "-e", "NOPE", "true"]).is_err());
        assert!(CommandLineArgs::try_parse_from(["spawnkit", "-e", "=x", "true"]).is_err());
    }

    #[test]
    fn command_is_required() {
        assert!(CommandLineArgs::try_parse_from(["spawnkit", "--clear-env"]).is_err());
    }

    #[test]
    fn config_flags_conflict() {
        assert!(CommandLineArgs::try_parse_from(["spawnkit", "--config", "x.toml", "--no-config", "true"]).is_err());
    }
}
