//! Platform abstraction facilities
//!
//! Exactly one spawn engine is compiled in: duplicate-and-replace on POSIX systems,
//! native process creation on Windows. The two share no code paths.

#[cfg(unix)]
pub(crate) mod unix;
#[cfg(unix)]
pub(crate) use unix as platform;

#[cfg(windows)]
pub(crate) mod windows;
#[cfg(windows)]
pub(crate) use windows as platform;

#[cfg(not(any(unix, windows)))]
compile_error!("spawnkit-core supports only unix and windows targets");

pub(crate) use platform::fd;
pub(crate) use platform::pipes;
pub(crate) use platform::signal;
pub(crate) use platform::spawn;
pub(crate) use platform::wait;

pub(crate) use platform::{NativeChild, ProcessId, RawDescriptor};
