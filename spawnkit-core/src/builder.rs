//! Fluent construction of a [`LaunchSpec`] and the process it describes.

use std::path::PathBuf;

use crate::descriptor::AsRawDescriptor;
use crate::launch::{LaunchSpec, RedirectTarget};
use crate::{error, pathsearch, process, sys};

/// Accumulates a [`LaunchSpec`] and starts the process it describes.
#[derive(Clone, Debug, Default)]
pub struct ProcessBuilder {
    spec: LaunchSpec,
}

impl ProcessBuilder {
    /// Returns a new builder with no command, no environment overrides, all
    /// streams piped, and the current directory as working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the executable to run, replacing any previously set.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        let command = command.into();
        if let Some(first) = self.spec.cmdline.first_mut() {
            *first = command;
        } else {
            self.spec.cmdline.push(command);
        }
        self
    }

    /// Appends arguments after the command.
    ///
    /// Arguments are only taken the first time; once any argument has been added,
    /// further calls are ignored.
    pub fn arguments(mut self, args: impl IntoIterator<Item: Into<String>>) -> Self {
        if self.spec.cmdline.len() <= 1 {
            if self.spec.cmdline.is_empty() {
                // Reserve the slot for the command, which may be set later.
                self.spec.cmdline.push(String::new());
            }
            self.spec.cmdline.extend(args.into_iter().map(Into::into));
        }
        self
    }

    /// Adds an environment variable for the child. If the key was already given,
    /// the first value is kept.
    pub fn environment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.entry(key.into()).or_insert_with(|| value.into());
        self
    }

    /// Controls whether the child starts from a copy of this process's environment
    /// (the default) or only from the overrides given with [`Self::environment`].
    pub const fn inherit_environment(mut self, inherit: bool) -> Self {
        self.spec.inherit_env = inherit;
        self
    }

    /// Connects the child's standard input to a descriptor owned by the caller.
    pub fn redirect_stdin(mut self, target: &impl AsRawDescriptor) -> Self {
        self.spec.stdin = RedirectTarget::Descriptor(target.as_raw_descriptor());
        self
    }

    /// Connects the child's standard output to a descriptor owned by the caller.
    pub fn redirect_stdout(mut self, target: &impl AsRawDescriptor) -> Self {
        self.spec.stdout = RedirectTarget::Descriptor(target.as_raw_descriptor());
        self
    }

    /// Connects the child's standard error to a descriptor owned by the caller.
    pub fn redirect_stderr(mut self, target: &impl AsRawDescriptor) -> Self {
        self.spec.stderr = RedirectTarget::Descriptor(target.as_raw_descriptor());
        self
    }

    /// Sets the child's working directory.
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.cwd = path.into();
        self
    }

    /// Sends the child's standard error to wherever its standard output goes.
    pub const fn merge_outputs(mut self, merge: bool) -> Self {
        self.spec.merge_outputs = merge;
        self
    }

    /// Returns the launch specification accumulated so far.
    pub const fn launch_spec(&self) -> &LaunchSpec {
        &self.spec
    }

    /// Launches the process.
    ///
    /// Blocks only until it is known whether the child managed to execute the
    /// requested program; the child's own lifetime is not awaited.
    pub fn start(&self) -> Result<process::ProcessHandle, error::Error> {
        if self.spec.cmdline.is_empty() {
            return Err(error::Error::NoCommand);
        }

        let search_path = pathsearch::SearchPath::from_env();
        let info = sys::spawn::spawn(&self.spec, &search_path)?;

        Ok(process::ProcessHandle::new(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_overwrites_first_token() {
        let builder = ProcessBuilder::new().command("ls").command("cat");
        assert_eq!(builder.launch_spec().cmdline(), ["cat"]);
    }

    #[test]
    fn arguments_only_apply_once() {
        let builder = ProcessBuilder::new()
            .command("echo")
            .arguments(["a", "b"])
            .arguments(["c"]);
        assert_eq!(builder.launch_spec().cmdline(), ["echo", "a", "b"]);
    }

    #[test]
    fn arguments_before_command_keep_their_place() {
        let builder = ProcessBuilder::new().arguments(["-l"]).command("ls");
        assert_eq!(builder.launch_spec().cmdline(), ["ls", "-l"]);
    }

    #[test]
    fn first_environment_value_wins() {
        let builder = ProcessBuilder::new()
            .environment("KEY", "first")
            .environment("KEY", "second");
        assert_eq!(
            builder
                .launch_spec()
                .env_overrides()
                .get("KEY")
                .map(String::as_str),
            Some("first")
        );
    }

    #[test]
    fn defaults() {
        let builder = ProcessBuilder::new();
        let spec = builder.launch_spec();
        assert_eq!(spec.cwd(), std::path::Path::new("."));
        assert!(!spec.merges_outputs());
        assert!(spec.inherits_env());
        assert_eq!(spec.target(crate::StdStream::Stdout), RedirectTarget::Unset);
    }

    #[test]
    fn start_without_command_fails() {
        let result = ProcessBuilder::new().start();
        assert!(matches!(result, Err(error::Error::NoCommand)));
    }
}
