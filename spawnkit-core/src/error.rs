use crate::launch::StdStream;

/// Monolithic error type for process management.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The private pipe used to report exec failures could not be created.
    #[error("unable to create communication pipe: {0}")]
    FailPipe(#[source] std::io::Error),

    /// A standard stream could not be bound to a pipe.
    #[error("unable to bind {stream}: {source}")]
    StreamBinding {
        /// The stream that failed to bind.
        stream: StdStream,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// A command-line token, environment entry, or directory could not be passed
    /// to the operating system.
    #[error("invalid argument for child process: {0}")]
    InvalidArgument(String),

    /// No command was given to the builder.
    #[error("no command specified")]
    NoCommand,

    /// The calling process could not be duplicated.
    #[error("unable to fork subprocess: {0}")]
    Fork(#[source] std::io::Error),

    /// The child process was created but could not execute the requested command.
    /// By the time this error is observed, the child has been reaped.
    #[error("child exec failed: {command}: {source}")]
    ExecFailed {
        /// The command that was being executed.
        command: String,
        /// The OS error reported by the child.
        #[source]
        source: std::io::Error,
    },

    /// The native process-creation call failed.
    #[error("unable to create process: {command}: {source}")]
    CreateProcess {
        /// The command that was being executed.
        command: String,
        /// The OS error reported by the creation call.
        #[source]
        source: std::io::Error,
    },

    /// The exec-status payload from the child could not be read consistently.
    #[error("read failed: {0}")]
    FailPipeRead(#[source] std::io::Error),

    /// Polling a child's status failed for a reason other than the child being gone.
    #[cfg(unix)]
    #[error("failed to poll child process status: {0}")]
    PollFailed(#[source] nix::errno::Errno),

    /// The current disposition of SIGCHLD could not be queried.
    #[cfg(unix)]
    #[error("failed to query SIGCHLD disposition: {0}")]
    SignalDisposition(#[source] nix::errno::Errno),

    /// Waiting on the child through the native wait primitive failed.
    #[error("failed to wait for child process: {0}")]
    WaitFailed(#[source] std::io::Error),

    /// A termination signal could not be delivered to the child.
    #[error("failed to send signal to process {0}")]
    FailedToSendSignal(crate::ProcessId),

    /// An I/O error occurred.
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),

    /// A system error occurred.
    #[cfg(unix)]
    #[error("system error: {0}")]
    ErrnoError(#[from] nix::errno::Errno),
}

impl Error {
    /// Returns true if the error indicates the requested executable could not be found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ExecFailed { source, .. } | Self::CreateProcess { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}
