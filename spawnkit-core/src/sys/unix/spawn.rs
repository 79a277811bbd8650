//! Duplicate-and-replace spawn engine.
//!
//! The parent allocates a close-on-exec "fail pipe" before forking. If the child
//! reaches `execve` successfully, the kernel closes the write end and the parent
//! reads end-of-file. Otherwise the child writes its `errno` (native-endian `i32`)
//! and exits; the parent reads the 4-byte payload, reaps the child, and reports the
//! failure.

use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::libc;
use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, fork};

use crate::descriptor::Descriptor;
use crate::fdstream::{FdReader, FdWriter};
use crate::launch::{LaunchSpec, StdStream};
use crate::pathsearch::SearchPath;
use crate::process::ProcessInfo;
use crate::redirect::ResolvedStreams;
use crate::sys::unix::exec::ExecPlan;
use crate::sys::unix::{NativeChild, fd, inherited, pipes};
use crate::{error, trace_categories};

/// Exit status of a child that failed before or during `execve`.
const EXEC_FAILURE_EXIT_CODE: i32 = 127;

/// Size of the exec-failure payload.
const ERRNO_PAYLOAD_LEN: usize = std::mem::size_of::<i32>();

/// Spawns the process described by `spec`.
pub(crate) fn spawn(spec: &LaunchSpec, search_path: &SearchPath) -> Result<ProcessInfo, error::Error> {
    let (fail_read, fail_write) = pipes::pipe().map_err(error::Error::FailPipe)?;
    let mut streams = ResolvedStreams::resolve(spec, |_| pipes::pipe())?;
    let mut plan = ExecPlan::new(spec, search_path)?;
    let limit = inherited::descriptor_limit();

    let (Some(fail_read_raw), Some(fail_write_raw)) = (fail_read.as_raw(), fail_write.as_raw()) else {
        return Err(error::Error::FailPipe(std::io::Error::from(
            std::io::ErrorKind::InvalidInput,
        )));
    };

    let child_ends = streams.child_ends();
    let parent_ends = streams.parent_ends();

    // SAFETY: The child branch below only performs async-signal-safe operations on
    // data prepared before the fork, and always ends in `execve` or `_exit`.
    let fork_result = unsafe { fork() }.map_err(|e| error::Error::Fork(e.into()))?;

    match fork_result {
        ForkResult::Child => run_child(
            &mut plan,
            fail_read_raw,
            fail_write_raw,
            child_ends,
            parent_ends,
            limit,
        ),
        ForkResult::Parent { child } => {
            drop(fail_write);
            let result = await_exec(child, spec, fail_read);
            streams.close_child_ends();

            match result {
                Ok(()) => {
                    tracing::debug!(
                        target: trace_categories::SPAWN,
                        "spawned {:?} as pid {child}",
                        spec.cmdline
                    );

                    Ok(ProcessInfo {
                        child: NativeChild::new(child),
                        stdin: FdWriter::new(streams.stdin.take_parent_end(StdStream::Stdin)),
                        stdout: FdReader::new(streams.stdout.take_parent_end(StdStream::Stdout)),
                        stderr: FdReader::new(streams.stderr.take_parent_end(StdStream::Stderr)),
                    })
                }
                Err(e) => {
                    tracing::debug!(target: trace_categories::SPAWN, "spawn of {:?} failed: {e}", spec.cmdline);
                    Err(e)
                }
            }
        }
    }
}

/// Reads the exec status from the fail pipe. On an exec failure the child has
/// already exited and is reaped here.
fn await_exec(child: Pid, spec: &LaunchSpec, fail_read: Descriptor) -> Result<(), error::Error> {
    let Some(raw) = fail_read.as_raw() else {
        return Err(error::Error::FailPipeRead(std::io::ErrorKind::InvalidInput.into()));
    };

    let mut payload = [0u8; ERRNO_PAYLOAD_LEN];
    let read = fd::read_fully(raw, &mut payload).map_err(error::Error::FailPipeRead)?;
    drop(fail_read);

    match read {
        0 => Ok(()),
        ERRNO_PAYLOAD_LEN => {
            reap(child);

            let errno = i32::from_ne_bytes(payload);
            Err(error::Error::ExecFailed {
                command: spec.program().unwrap_or_default().to_owned(),
                source: std::io::Error::from_raw_os_error(errno),
            })
        }
        partial => {
            // A child that wrote any status bytes is on its way to `_exit`.
            reap(child);
            Err(error::Error::FailPipeRead(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("received {partial} of {ERRNO_PAYLOAD_LEN} status bytes"),
            )))
        }
    }
}

/// Blocks until `child` has been reaped.
fn reap(child: Pid) {
    loop {
        match waitpid(child, None) {
            Err(Errno::EINTR) => (),
            // With SIGCHLD ignored the kernel reaps the child itself.
            Ok(_) | Err(Errno::ECHILD) => break,
            Err(e) => {
                tracing::warn!(target: trace_categories::WAIT, "failed to reap pid {child}: {e}");
                break;
            }
        }
    }
}

/// Runs in the child between `fork` and `execve`.
///
/// Async-signal-safe: no allocation, no locks, no logging, and no Rust destructors.
/// Every exit path goes through `_exit`.
fn run_child(
    plan: &mut ExecPlan,
    fail_read: RawFd,
    fail_write: RawFd,
    child_ends: [Option<RawFd>; 3],
    parent_ends: [Option<RawFd>; 3],
    limit: RawFd,
) -> ! {
    // SAFETY: `fail_read` belongs to the parent side of the fail pipe.
    unsafe { libc::close(fail_read) };
    for raw in parent_ends.into_iter().flatten() {
        // SAFETY: the parent's stream ends are unused in the child.
        unsafe { libc::close(raw) };
    }

    // Restore default signal handling; dispositions set to "ignore" survive exec.
    // SAFETY: async-signal-safe; no handler is installed.
    unsafe { libc::signal(libc::SIGPIPE, libc::SIG_DFL) };
    // SAFETY: `sigset_t` is plain data; all-zeroes is a valid value.
    let mut empty: libc::sigset_t = unsafe { std::mem::zeroed() };
    // SAFETY: `empty` is a live local.
    unsafe { libc::sigemptyset(&raw mut empty) };
    // SAFETY: `empty` is initialized; the old mask is not requested.
    unsafe { libc::sigprocmask(libc::SIG_SETMASK, &raw const empty, std::ptr::null_mut()) };

    // A source sitting on a lower standard slot than its target would be
    // overwritten by an earlier `dup2`; move such sources above the standard
    // range first. `F_DUPFD` leaves the copy without close-on-exec, and the
    // copy is closed below along with the other sources.
    let mut sources = child_ends;
    for (target, slot) in (0..).zip(sources.iter_mut()) {
        let Some(source) = *slot else {
            continue;
        };
        if source <= 2 && source != target {
            // SAFETY: duplicating an open descriptor in the child only affects the child.
            let moved = unsafe { libc::fcntl(source, libc::F_DUPFD, 3) };
            if moved < 0 {
                fail(fail_write);
            }
            *slot = Some(moved);
        }
    }

    for (target, source) in (0..).zip(sources) {
        let Some(source) = source else {
            continue;
        };

        let installed = if source == target {
            // Already in place; only make sure it survives exec.
            fd::set_cloexec(source, false).is_ok()
        } else {
            // SAFETY: `source` is open; replacing a standard slot only affects the child.
            unsafe { libc::dup2(source, target) >= 0 }
        };

        if !installed {
            fail(fail_write);
        }
    }

    for source in sources.into_iter().flatten() {
        if source > 2 {
            // SAFETY: the source has been installed on its standard slot.
            unsafe { libc::close(source) };
        }
    }

    // The child cannot log; the strategy only matters to tests.
    let _ = inherited::close_inherited(3, fail_write, limit);

    // SAFETY: the working directory is a NUL-terminated C string owned by `plan`.
    if unsafe { libc::chdir(plan.cwd().as_ptr()) } != 0 {
        fail(fail_write);
    }

    // The fail pipe must close on a successful exec.
    if fd::set_cloexec(fail_write, true).is_err() {
        fail(fail_write);
    }

    let errno = plan.execute();
    report_and_exit(fail_write, errno)
}

/// Reports the current `errno` through the fail pipe and exits.
fn fail(fail_write: RawFd) -> ! {
    report_and_exit(fail_write, Errno::last() as i32)
}

fn report_and_exit(fail_write: RawFd, errno: i32) -> ! {
    let payload = errno.to_ne_bytes();
    let mut written = 0;

    while written < payload.len() {
        let Some(remaining) = payload.get(written..) else {
            break;
        };

        // SAFETY: `remaining` is a valid readable region.
        let result = unsafe { libc::write(fail_write, remaining.as_ptr().cast(), remaining.len()) };
        match usize::try_from(result) {
            Ok(n) if n > 0 => written += n,
            _ if Errno::last() == Errno::EINTR => (),
            _ => break,
        }
    }

    // SAFETY: the fail pipe is not written again.
    unsafe { libc::close(fail_write) };
    // SAFETY: terminating the child without running atexit handlers or destructors.
    unsafe { libc::_exit(EXEC_FAILURE_EXIT_CODE) }
}
