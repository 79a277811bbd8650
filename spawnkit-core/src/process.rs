//! Process management

use crate::builder::ProcessBuilder;
use crate::fdstream::{FdReader, FdWriter};
use crate::{error, sys, trace_categories};

/// A process identifier.
pub type ProcessId = sys::ProcessId;

/// What the spawn engine hands over for a started child: its native identity and
/// the parent's ends of the standard streams. Streams that were redirected to a
/// caller descriptor, or merged, are detached.
#[derive(Debug)]
pub(crate) struct ProcessInfo {
    pub child: sys::NativeChild,
    pub stdin: FdWriter,
    pub stdout: FdReader,
    pub stderr: FdReader,
}

/// A running (or exited but not yet reaped) child process.
///
/// The handle exclusively owns the parent's ends of the child's standard streams
/// and is responsible for reaping the child. Dropping it closes those streams but
/// neither signals nor waits for the child; a child that is never waited on is
/// left as a zombie until this process exits.
#[derive(Debug)]
pub struct ProcessHandle {
    info: ProcessInfo,
    exit_code: Option<i32>,
    reaped: bool,
}

impl ProcessHandle {
    pub(crate) const fn new(info: ProcessInfo) -> Self {
        Self {
            info,
            exit_code: None,
            reaped: false,
        }
    }

    /// Returns the native identifier of the child.
    pub const fn id(&self) -> ProcessId {
        self.info.child.id()
    }

    /// The child's standard input.
    pub const fn stdin(&mut self) -> &mut FdWriter {
        &mut self.info.stdin
    }

    /// The child's standard output.
    pub const fn stdout(&mut self) -> &mut FdReader {
        &mut self.info.stdout
    }

    /// The child's standard error. Detached when outputs are merged.
    pub const fn stderr(&mut self) -> &mut FdReader {
        &mut self.info.stderr
    }

    /// Takes ownership of the child's standard input, leaving a detached stream
    /// behind. Dropping the returned writer signals end-of-file to the child.
    pub fn take_stdin(&mut self) -> FdWriter {
        std::mem::replace(&mut self.info.stdin, FdWriter::detached())
    }

    /// Takes ownership of the child's standard output, leaving a detached stream
    /// behind.
    pub fn take_stdout(&mut self) -> FdReader {
        std::mem::replace(&mut self.info.stdout, FdReader::detached())
    }

    /// Takes ownership of the child's standard error, leaving a detached stream
    /// behind.
    pub fn take_stderr(&mut self) -> FdReader {
        std::mem::replace(&mut self.info.stderr, FdReader::detached())
    }

    /// Waits for the child to exit and reaps it, returning its exit code. A child
    /// killed by a signal reports `0x80 + signal` on POSIX systems, and so does a
    /// stopped child, which is left unreaped.
    ///
    /// Once the child is reaped its code is cached; later calls return it without
    /// touching the child again. A stopped child is waited on again.
    pub fn wait_for(&mut self) -> Result<i32, error::Error> {
        if let (true, Some(code)) = (self.reaped, self.exit_code) {
            return Ok(code);
        }

        let termination = sys::wait::wait_for(&self.info.child)?;
        self.exit_code = Some(termination.code);
        self.reaped = termination.reaped;

        Ok(termination.code)
    }

    /// Returns true if the child has terminated. Does not reap it.
    pub fn has_exited(&self) -> Result<bool, error::Error> {
        if self.reaped {
            return Ok(true);
        }

        sys::wait::has_exited(&self.info.child)
    }

    /// Asks the child to terminate, or kills it outright when `force` is set. Does
    /// not wait; call [`Self::wait_for`] to reap the child afterwards.
    ///
    /// On Windows both requests terminate the process immediately.
    pub fn interrupt(&mut self, force: bool) -> Result<(), error::Error> {
        if self.reaped {
            // The id may belong to another process by now.
            return Ok(());
        }

        tracing::debug!(target: trace_categories::WAIT, "interrupting pid {} (force: {force})", self.id());
        sys::signal::terminate(&self.info.child, force)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if !self.reaped {
            tracing::debug!(
                target: trace_categories::WAIT,
                "dropping handle for pid {} without waiting for it",
                self.id()
            );
        }
    }
}

/// Starts `command` with no arguments.
pub fn exec(command: impl Into<String>) -> Result<ProcessHandle, error::Error> {
    ProcessBuilder::new().command(command).start()
}

/// Starts `command` with the given arguments.
pub fn exec_with_args<I>(command: impl Into<String>, args: I) -> Result<ProcessHandle, error::Error>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    ProcessBuilder::new().command(command).arguments(args).start()
}
