//! Errors reported by the command-line front end.

use std::path::PathBuf;

/// Exit code reported when the command could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when the command was found but could not be started.
pub const EXIT_CANNOT_EXECUTE: i32 = 126;
/// Exit code reported for failures of the tool itself.
pub const EXIT_FAILURE: i32 = 1;

/// Monolithic error type for the command-line front end.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    /// The configuration file could not be loaded.
    #[error("{}: {source}", path.display())]
    Config {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: crate::config::ConfigLoadError,
    },

    /// A file named for redirection could not be opened.
    #[error("{}: {source}", path.display())]
    OpenRedirect {
        /// The file that was being opened.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// A duration was negative, not finite, or too large.
    #[error("invalid {name}: {value}")]
    InvalidDuration {
        /// The setting that held the value.
        name: &'static str,
        /// The rejected value, in seconds.
        value: f64,
    },

    /// The command could not be started.
    #[error(transparent)]
    Spawn(spawnkit_core::Error),

    /// Waiting for or signalling the command failed.
    #[error(transparent)]
    Wait(spawnkit_core::Error),

    /// Tracing could not be reconfigured.
    #[error("failed to update tracing: {0}")]
    Tracing(String),
}

impl CliError {
    /// The exit code to report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Spawn(e) if e.is_not_found() => EXIT_NOT_FOUND,
            Self::Spawn(_) => EXIT_CANNOT_EXECUTE,
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_errors_map_to_shell_exit_codes() {
        let not_found = CliError::Spawn(spawnkit_core::Error::ExecFailed {
            command: "missing".into(),
            source: std::io::ErrorKind::NotFound.into(),
        });
        assert_eq!(not_found.exit_code(), EXIT_NOT_FOUND);

        let denied = CliError::Spawn(spawnkit_core::Error::ExecFailed {
            command: "locked".into(),
            source: std::io::ErrorKind::PermissionDenied.into(),
        });
        assert_eq!(denied.exit_code(), EXIT_CANNOT_EXECUTE);

        assert_eq!(CliError::Tracing("x".into()).exit_code(), EXIT_FAILURE);
    }
}
