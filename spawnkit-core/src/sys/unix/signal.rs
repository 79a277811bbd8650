use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::error;
use crate::sys::unix::NativeChild;

/// Sends SIGTERM to the child, or SIGKILL when `force` is set.
pub(crate) fn terminate(child: &NativeChild, force: bool) -> Result<(), error::Error> {
    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };

    nix::sys::signal::kill(child.pid(), signal)
        .map_err(|_errno| error::Error::FailedToSendSignal(child.id()))?;

    Ok(())
}

/// Returns true if the current disposition of SIGCHLD is "ignore".
pub(crate) fn sigchld_ignored() -> Result<bool, error::Error> {
    // SAFETY: `sigaction` is plain data; all-zeroes is a valid value.
    let mut current: libc::sigaction = unsafe { std::mem::zeroed() };
    // SAFETY: a null new action only queries the current disposition.
    let result = unsafe { libc::sigaction(libc::SIGCHLD, std::ptr::null(), &raw mut current) };
    Errno::result(result).map_err(error::Error::SignalDisposition)?;

    Ok(current.sa_sigaction == libc::SIG_IGN)
}

/// Best-effort check for whether a process with the given id still exists.
/// A recycled pid makes an exited process look alive.
#[cfg(target_os = "linux")]
pub(crate) fn process_entry_exists(pid: Pid) -> bool {
    match procfs::process::Process::new(pid.as_raw()) {
        Ok(_) => true,
        Err(procfs::ProcError::NotFound(_)) => false,
        // Present but unreadable still means present.
        Err(_) => true,
    }
}

/// Best-effort check for whether a process with the given id still exists.
/// A recycled pid makes an exited process look alive.
#[cfg(not(target_os = "linux"))]
pub(crate) fn process_entry_exists(pid: Pid) -> bool {
    !matches!(nix::sys::signal::kill(pid, None), Err(Errno::ESRCH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_exists() {
        assert!(process_entry_exists(nix::unistd::getpid()));
    }

    #[test]
    fn reaped_child_has_no_entry() -> anyhow::Result<()> {
        use nix::unistd::{ForkResult, fork};

        // SAFETY: the child only calls `_exit`.
        let child = match unsafe { fork() }? {
            // SAFETY: `_exit` is async-signal-safe.
            ForkResult::Child => unsafe { libc::_exit(0) },
            ForkResult::Parent { child } => child,
        };

        // An unreaped zombie still has an entry.
        assert!(process_entry_exists(child));
        nix::sys::wait::waitpid(child, None)?;
        assert!(!process_entry_exists(child));
        Ok(())
    }

    #[test]
    fn default_disposition_is_not_ignored() -> anyhow::Result<()> {
        assert!(!sigchld_ignored()?);
        Ok(())
    }
}
