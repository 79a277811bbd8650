//! Status polling and reaping.

use std::time::Duration;

use nix::errno::Errno;
use nix::libc;

use crate::status::{ProcessStatus, Termination};
use crate::sys::unix::{NativeChild, signal};
use crate::{error, trace_categories};

/// Longest pause between two polls in `wait_for`.
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Number of polls that only yield the CPU before `wait_for` starts sleeping.
const SPIN_POLLS: u32 = 16;

/// Polls the child's status once without reaping it.
pub(crate) fn poll(child: &NativeChild) -> Result<ProcessStatus, Errno> {
    #[allow(clippy::cast_sign_loss)]
    let id = child.id() as libc::id_t;
    let flags = libc::WEXITED | libc::WSTOPPED | libc::WNOHANG | libc::WNOWAIT;

    // SAFETY: `siginfo_t` is plain data; all-zeroes is a valid value, and leaves
    // `si_pid` at 0 when a live child is not filled in.
    let mut siginfo: libc::siginfo_t = unsafe { std::mem::zeroed() };
    loop {
        // SAFETY: `siginfo` is a live local the kernel writes into.
        let result = unsafe { libc::waitid(libc::P_PID, id, &raw mut siginfo, flags) };
        match Errno::result(result) {
            Ok(_) => break,
            Err(Errno::EINTR) => (),
            Err(e) => return Err(e),
        }
    }

    Ok(decode_siginfo(&siginfo))
}

/// Decodes the `siginfo_t` filled in by `waitid`. The raw signal number is kept
/// as is, so real-time signals decode like any other.
fn decode_siginfo(siginfo: &libc::siginfo_t) -> ProcessStatus {
    // SAFETY: `si_pid` is valid for a `siginfo_t` filled in (or zeroed) for `waitid`.
    let si_pid = unsafe { siginfo.si_pid() };
    if si_pid == 0 {
        return ProcessStatus::Running;
    }

    // SAFETY: as above; `si_status` is set for every `CLD_*` code.
    let si_status = unsafe { siginfo.si_status() };
    match siginfo.si_code {
        libc::CLD_EXITED => ProcessStatus::Exited(si_status),
        libc::CLD_KILLED | libc::CLD_DUMPED | libc::CLD_STOPPED => ProcessStatus::from_signal(si_status),
        _ => ProcessStatus::Running,
    }
}

/// Polls until the child reaches a terminal state, then tries to reap it. Never
/// blocks in the kernel.
///
/// A stopped child is reported once as `0x80 + signal` but stays waitable; the
/// returned [`Termination`] says whether it was collected.
pub(crate) fn wait_for(child: &NativeChild) -> Result<Termination, error::Error> {
    let mut polls: u32 = 0;

    let code = loop {
        match poll(child) {
            Ok(ProcessStatus::Running) => (),
            Ok(status) => break status.exit_code().unwrap_or_default(),
            Err(Errno::ECHILD) => {
                tracing::debug!(target: trace_categories::WAIT, "pid {} already reaped; reporting 0", child.id());
                return Ok(Termination { code: 0, reaped: true });
            }
            Err(e) => return Err(error::Error::PollFailed(e)),
        }

        polls = polls.saturating_add(1);
        if polls <= SPIN_POLLS {
            std::thread::yield_now();
        } else {
            let backoff = Duration::from_micros(50).saturating_mul(polls - SPIN_POLLS);
            std::thread::sleep(backoff.min(MAX_POLL_INTERVAL));
        }
    };

    let (code, reaped) = match reap(child, code) {
        Some(collected) => (collected, true),
        None => (code, false),
    };
    tracing::debug!(
        target: trace_categories::WAIT,
        "pid {} finished with code {code} (reaped: {reaped})",
        child.id()
    );

    Ok(Termination { code, reaped })
}

/// Polls once and reports whether the child has terminated.
///
/// When the child can no longer be waited on (`ECHILD`) and SIGCHLD is ignored,
/// the kernel reaps children on its own and the only remaining signal is whether
/// the process still exists. That check races with pid reuse: a recycled pid
/// makes an exited child look alive.
pub(crate) fn has_exited(child: &NativeChild) -> Result<bool, error::Error> {
    match poll(child) {
        Ok(status) => Ok(status.is_terminal()),
        Err(Errno::ECHILD) => {
            if signal::sigchld_ignored()? {
                let exists = signal::process_entry_exists(child.pid());
                tracing::debug!(
                    target: trace_categories::WAIT,
                    "pid {} not waitable with SIGCHLD ignored; entry exists: {exists}",
                    child.id()
                );
                Ok(!exists)
            } else {
                Ok(true)
            }
        }
        Err(e) => Err(error::Error::PollFailed(e)),
    }
}

/// Collects the terminated child so the kernel can release it, returning the
/// code it was collected with. Returns `None` when the child is only stopped;
/// its stop report is consumed so the next wait sees what happens after it.
///
/// Calls `waitpid` directly: the raw status of a child killed by a real-time
/// signal does not convert to a `nix` `Signal`.
fn reap(child: &NativeChild, polled_code: i32) -> Option<i32> {
    let mut raw_status: libc::c_int = 0;
    loop {
        // SAFETY: `raw_status` is a live local the kernel writes into.
        let result = unsafe { libc::waitpid(child.id(), &raw mut raw_status, libc::WNOHANG | libc::WUNTRACED) };
        match Errno::result(result) {
            Err(Errno::EINTR) => (),
            Ok(0) => return None,
            Ok(_) if libc::WIFEXITED(raw_status) => return Some(libc::WEXITSTATUS(raw_status)),
            Ok(_) if libc::WIFSIGNALED(raw_status) => {
                return ProcessStatus::from_signal(libc::WTERMSIG(raw_status)).exit_code();
            }
            Ok(_) => return None,
            // Reaped concurrently, or SIGCHLD is ignored.
            Err(Errno::ECHILD) => return Some(polled_code),
            Err(e) => {
                tracing::warn!(target: trace_categories::WAIT, "failed to reap pid {}: {e}", child.id());
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use nix::unistd::{ForkResult, Pid, fork};
    use pretty_assertions::assert_eq;

    fn fork_exiting_with(code: i32) -> anyhow::Result<NativeChild> {
        // SAFETY: the child only calls `_exit`.
        match unsafe { fork() }? {
            // SAFETY: `_exit` is async-signal-safe.
            ForkResult::Child => unsafe { libc::_exit(code) },
            ForkResult::Parent { child } => Ok(NativeChild::new(child)),
        }
    }

    fn fork_pausing() -> anyhow::Result<NativeChild> {
        // SAFETY: the child only pauses until it is killed.
        match unsafe { fork() }? {
            ForkResult::Child => loop {
                // SAFETY: `pause` is async-signal-safe.
                unsafe { libc::pause() };
            },
            ForkResult::Parent { child } => Ok(NativeChild::new(child)),
        }
    }

    #[test]
    fn exit_code_is_decoded_and_cached_by_reaping() -> anyhow::Result<()> {
        let child = fork_exiting_with(42)?;
        assert_eq!(wait_for(&child)?, Termination { code: 42, reaped: true });

        // The child is gone now; polling it folds into "already exited".
        assert_eq!(poll(&child), Err(Errno::ECHILD));
        assert!(has_exited(&child)?);
        Ok(())
    }

    #[test]
    fn signalled_child_is_offset() -> anyhow::Result<()> {
        let child = fork_pausing()?;

        assert!(!has_exited(&child)?);
        nix::sys::signal::kill(child.pid(), Signal::SIGKILL)?;
        assert_eq!(wait_for(&child)?, Termination { code: 0x80 + 9, reaped: true });
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn realtime_signal_death_is_decoded() -> anyhow::Result<()> {
        let child = fork_pausing()?;

        // SAFETY: plain syscall; signal 40 lies in the real-time range on Linux.
        assert_eq!(unsafe { libc::kill(child.id(), 40) }, 0);
        assert_eq!(wait_for(&child)?, Termination { code: 168, reaped: true });
        assert_eq!(poll(&child), Err(Errno::ECHILD));
        Ok(())
    }

    #[test]
    fn stopped_child_is_reported_but_not_reaped() -> anyhow::Result<()> {
        let child = fork_pausing()?;

        nix::sys::signal::kill(child.pid(), Signal::SIGSTOP)?;
        let stopped = wait_for(&child)?;
        assert_eq!(stopped, Termination { code: 0x80 + libc::SIGSTOP, reaped: false });

        nix::sys::signal::kill(child.pid(), Signal::SIGKILL)?;
        assert_eq!(wait_for(&child)?, Termination { code: 0x80 + 9, reaped: true });
        Ok(())
    }

    #[test]
    fn unknown_child_is_already_exited() -> anyhow::Result<()> {
        let stranger = NativeChild::new(Pid::from_raw(1));
        assert_eq!(wait_for(&stranger)?, Termination { code: 0, reaped: true });
        Ok(())
    }
}
