pub(crate) mod exec;
pub(crate) mod fd;
pub(crate) mod inherited;
pub(crate) mod pipes;
pub(crate) mod signal;
pub(crate) mod spawn;
pub(crate) mod wait;

/// Raw descriptor type on POSIX systems.
pub type RawDescriptor = std::os::fd::RawFd;

/// Native process identifier on POSIX systems.
pub type ProcessId = i32;

/// The OS-level identity of a spawned child.
#[derive(Debug)]
pub(crate) struct NativeChild {
    pid: nix::unistd::Pid,
}

impl NativeChild {
    pub const fn new(pid: nix::unistd::Pid) -> Self {
        Self { pid }
    }

    pub const fn pid(&self) -> nix::unistd::Pid {
        self.pid
    }

    pub const fn id(&self) -> ProcessId {
        self.pid.as_raw()
    }
}
