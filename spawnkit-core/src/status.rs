//! Decoded child process status.

/// Offset added to a signal number to form the exit code of a process that was
/// killed or stopped by that signal; matches the convention used by POSIX shells.
#[cfg(unix)]
pub(crate) const SIGNAL_EXIT_BASE: i32 = 0x80;

/// The state of a child process as observed by a single poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The process terminated normally with the given exit status.
    Exited(i32),
    /// The process was killed (or stopped) by a signal. The code is
    /// `0x80 + signal number`.
    Signaled(i32),
    /// The process has not yet terminated.
    Running,
}

/// The outcome of waiting for a child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Termination {
    /// The exit code, or `0x80 + signal` for a child killed or stopped by a signal.
    pub code: i32,
    /// Whether the child was collected. A stopped child is reported but stays
    /// waitable, and can still be signalled.
    pub reaped: bool,
}

impl ProcessStatus {
    /// Builds the status of a process that was terminated or stopped by `signal`.
    #[cfg(unix)]
    pub(crate) const fn from_signal(signal: i32) -> Self {
        Self::Signaled(SIGNAL_EXIT_BASE + signal)
    }

    /// Returns the exit code of a terminated process, or `None` if it is still running.
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) | Self::Signaled(code) => Some(*code),
            Self::Running => None,
        }
    }

    /// Returns true if the process is no longer running.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn signal_codes_are_offset() {
        assert_eq!(ProcessStatus::from_signal(9), ProcessStatus::Signaled(137));
        assert_eq!(ProcessStatus::from_signal(15).exit_code(), Some(143));
    }

    #[test]
    fn running_has_no_code() {
        assert_eq!(ProcessStatus::Running.exit_code(), None);
        assert!(!ProcessStatus::Running.is_terminal());
        assert!(ProcessStatus::Exited(0).is_terminal());
    }
}
