//! The frozen description of a process to launch.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::descriptor::RawDescriptor;

/// Identifies one of the three standard streams of a child process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StdStream {
    /// Standard input.
    Stdin,
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl std::fmt::Display for StdStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Where one of the child's standard streams should go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RedirectTarget {
    /// No target was given; a pipe is allocated and the parent keeps one end.
    #[default]
    Unset,
    /// A descriptor owned by the caller. It is never closed by this crate.
    Descriptor(RawDescriptor),
}

impl RedirectTarget {
    /// Returns true if the stream is redirected to a caller-owned descriptor.
    pub const fn is_redirected(&self) -> bool {
        matches!(self, Self::Descriptor(_))
    }
}

/// Everything needed to launch a process. Built by
/// [`ProcessBuilder`](crate::ProcessBuilder) and never modified afterwards.
#[derive(Clone, Debug)]
pub struct LaunchSpec {
    pub(crate) cmdline: Vec<String>,
    pub(crate) env: IndexMap<String, String>,
    pub(crate) inherit_env: bool,
    pub(crate) cwd: PathBuf,
    pub(crate) stdin: RedirectTarget,
    pub(crate) stdout: RedirectTarget,
    pub(crate) stderr: RedirectTarget,
    pub(crate) merge_outputs: bool,
}

impl Default for LaunchSpec {
    fn default() -> Self {
        Self {
            cmdline: Vec::new(),
            env: IndexMap::new(),
            inherit_env: true,
            cwd: PathBuf::from("."),
            stdin: RedirectTarget::Unset,
            stdout: RedirectTarget::Unset,
            stderr: RedirectTarget::Unset,
            merge_outputs: false,
        }
    }
}

impl LaunchSpec {
    /// The full command line; the first token names the executable.
    pub fn cmdline(&self) -> &[String] {
        &self.cmdline
    }

    /// The executable to run, if one was set.
    pub fn program(&self) -> Option<&str> {
        self.cmdline.first().map(String::as_str)
    }

    /// Environment overrides, in insertion order.
    pub const fn env_overrides(&self) -> &IndexMap<String, String> {
        &self.env
    }

    /// Whether the child starts from a copy of the parent's environment.
    pub const fn inherits_env(&self) -> bool {
        self.inherit_env
    }

    /// The child's working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Whether the child's standard error is sent to the same place as its standard output.
    pub const fn merges_outputs(&self) -> bool {
        self.merge_outputs
    }

    /// The redirect target for the given stream.
    pub const fn target(&self, stream: StdStream) -> RedirectTarget {
        match stream {
            StdStream::Stdin => self.stdin,
            StdStream::Stdout => self.stdout,
            StdStream::Stderr => self.stderr,
        }
    }

    /// Renders the child's complete environment as `(key, value)` pairs: the parent's
    /// environment (unless inheritance is disabled) with the overrides applied on top.
    pub(crate) fn effective_env(&self) -> IndexMap<String, String> {
        let mut merged = IndexMap::new();

        if self.inherit_env {
            for (key, value) in std::env::vars_os() {
                if let (Ok(key), Ok(value)) = (key.into_string(), value.into_string()) {
                    merged.insert(key, value);
                }
            }
        }

        for (key, value) in &self.env {
            merged.insert(key.clone(), value.clone());
        }

        merged
    }
}
