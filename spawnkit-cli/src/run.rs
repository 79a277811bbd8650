//! Launching and supervising the command.

use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

use spawnkit_core::{ProcessBuilder, ProcessHandle};

use crate::config::RunOptions;
use crate::error::CliError;

/// Interval between liveness checks while a deadline is pending.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Files opened for redirection. They must outlive the spawn so their
/// descriptors are valid when the child inherits them.
struct RedirectFiles {
    stdin: Option<File>,
    stdout: Option<File>,
    stderr: Option<File>,
}

impl RedirectFiles {
    fn open(stdin: Option<&Path>, stdout: Option<&Path>, stderr: Option<&Path>) -> Result<Self, CliError> {
        let open_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CliError::OpenRedirect { path, source }
        };

        Ok(Self {
            stdin: stdin.map(|p| File::open(p).map_err(open_err(p))).transpose()?,
            stdout: stdout.map(|p| File::create(p).map_err(open_err(p))).transpose()?,
            stderr: stderr.map(|p| File::create(p).map_err(open_err(p))).transpose()?,
        })
    }
}

/// Runs `command` to completion and returns its exit code.
///
/// Standard streams not redirected to files are this process's own, handed to the
/// child as caller-owned descriptors.
pub fn run_command(
    command: &[String],
    options: &RunOptions,
    stdin: Option<&Path>,
    stdout: Option<&Path>,
    stderr: Option<&Path>,
) -> Result<i32, CliError> {
    let files = RedirectFiles::open(stdin, stdout, stderr)?;

    let (program, args) = command.split_first().ok_or(CliError::Spawn(spawnkit_core::Error::NoCommand))?;

    let mut builder = ProcessBuilder::new()
        .command(program.as_str())
        .arguments(args.iter().cloned())
        .inherit_environment(!options.clear_env)
        .merge_outputs(options.merge_outputs);

    for (key, value) in &options.env {
        builder = builder.environment(key.as_str(), value.as_str());
    }

    if let Some(dir) = &options.directory {
        builder = builder.directory(dir);
    }

    builder = match &files.stdin {
        Some(file) => builder.redirect_stdin(file),
        None => builder.redirect_stdin(&std::io::stdin()),
    };
    builder = match &files.stdout {
        Some(file) => builder.redirect_stdout(file),
        None => builder.redirect_stdout(&std::io::stdout()),
    };
    builder = match &files.stderr {
        Some(file) => builder.redirect_stderr(file),
        None => builder.redirect_stderr(&std::io::stderr()),
    };

    let mut child = builder.start().map_err(CliError::Spawn)?;

    // The child holds its own copies now.
    drop(files);

    if let Some(timeout) = options.timeout {
        enforce_timeout(&mut child, timeout, options.kill_after)?;
    }

    child.wait_for().map_err(CliError::Wait)
}

/// Terminates the child if it is still running after `timeout`, and kills it if it
/// is still running `kill_after` later. Does not reap it.
fn enforce_timeout(child: &mut ProcessHandle, timeout: Duration, kill_after: Duration) -> Result<(), CliError> {
    if exits_within(child, timeout)? {
        return Ok(());
    }

    tracing::info!("command timed out after {timeout:?}; terminating pid {}", child.id());
    child.interrupt(false).map_err(CliError::Wait)?;

    if exits_within(child, kill_after)? {
        return Ok(());
    }

    tracing::info!("pid {} ignored termination; killing it", child.id());
    child.interrupt(true).map_err(CliError::Wait)
}

/// Polls the child until it exits or `limit` elapses. Returns true if it exited.
///
/// A limit too large to represent as a deadline never elapses; true is returned
/// right away and the caller's blocking wait takes over.
fn exits_within(child: &ProcessHandle, limit: Duration) -> Result<bool, CliError> {
    let Some(deadline) = Instant::now().checked_add(limit) else {
        tracing::debug!("timeout of {limit:?} is unbounded; waiting without a deadline");
        return Ok(true);
    };

    loop {
        if child.has_exited().map_err(CliError::Wait)? {
            return Ok(true);
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }

        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}
