//! Snapshots of the executable search path.

use std::path::PathBuf;

/// Search list used when `PATH` is not set.
pub const DEFAULT_SEARCH_PATH: &str = ":/bin:/usr/bin";

/// An immutable snapshot of the directories searched for bare executable names.
///
/// The snapshot is taken by the parent before spawning, so resolution never reads
/// the ambient environment from inside the child.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// Captures the current process's `PATH`, falling back to [`DEFAULT_SEARCH_PATH`]
    /// when it is unset.
    pub fn from_env() -> Self {
        match std::env::var_os("PATH") {
            Some(path) => Self::parse(path),
            None => Self::parse(DEFAULT_SEARCH_PATH),
        }
    }

    /// Splits a `PATH`-style list into directories. Empty entries refer to the
    /// current directory.
    pub fn parse(path: impl AsRef<std::ffi::OsStr>) -> Self {
        let dirs = std::env::split_paths(path.as_ref())
            .map(|dir| {
                if dir.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    dir
                }
            })
            .collect();

        Self { dirs }
    }

    /// The directories, in search order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Yields the candidate locations for `filename`, one per directory, in order.
    pub fn candidates<'a>(&'a self, filename: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        self.dirs.iter().map(move |dir| dir.join(filename))
    }
}

/// Returns true if `command` names a path rather than a bare executable name.
#[cfg(unix)]
pub(crate) fn contains_separator(command: &str) -> bool {
    command.contains('/')
}
