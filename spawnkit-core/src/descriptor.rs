//! Owned OS descriptors and pipe creation.

use crate::{error, sys, trace_categories};

/// The platform's raw descriptor type: a file descriptor on POSIX systems, a
/// `HANDLE` on Windows.
pub type RawDescriptor = sys::RawDescriptor;

/// Anything that can lend out its raw descriptor without giving up ownership.
///
/// Implemented for every `AsRawFd` type on POSIX systems and every `AsRawHandle`
/// type on Windows.
pub trait AsRawDescriptor {
    /// Returns the raw descriptor; ownership stays with `self`.
    fn as_raw_descriptor(&self) -> RawDescriptor;
}

#[cfg(unix)]
impl<T: std::os::fd::AsRawFd> AsRawDescriptor for T {
    fn as_raw_descriptor(&self) -> RawDescriptor {
        self.as_raw_fd()
    }
}

#[cfg(windows)]
impl<T: std::os::windows::io::AsRawHandle> AsRawDescriptor for T {
    fn as_raw_descriptor(&self) -> RawDescriptor {
        self.as_raw_handle()
    }
}

/// An owned descriptor that is closed at most once.
///
/// Unlike `OwnedFd`, a `Descriptor` may be empty, and failures to close are
/// logged instead of being silently dropped.
#[derive(Debug)]
pub struct Descriptor(Option<RawDescriptor>);

// SAFETY: A Windows HANDLE is a process-wide kernel object reference; it is only
// represented as a pointer. Ownership of the handle moves with the `Descriptor`.
#[cfg(windows)]
unsafe impl Send for Descriptor {}

// SAFETY: See the `Send` impl above; `&Descriptor` only exposes the raw value.
#[cfg(windows)]
unsafe impl Sync for Descriptor {}

impl Descriptor {
    /// Returns an empty descriptor that owns nothing.
    pub const fn invalid() -> Self {
        Self(None)
    }

    /// Takes ownership of a raw descriptor.
    ///
    /// # Safety
    ///
    /// `raw` must be an open descriptor that nothing else will close.
    pub const unsafe fn from_raw(raw: RawDescriptor) -> Self {
        Self(Some(raw))
    }

    /// Returns true if the descriptor still owns something.
    pub const fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// Returns the raw descriptor without giving up ownership.
    pub const fn as_raw(&self) -> Option<RawDescriptor> {
        self.0
    }

    /// Gives up ownership of the raw descriptor; the caller becomes responsible for
    /// closing it.
    pub fn into_raw(mut self) -> Option<RawDescriptor> {
        self.0.take()
    }

    /// Closes the descriptor. Closing an already-closed descriptor does nothing.
    pub fn close(&mut self) -> Result<(), error::Error> {
        if let Some(raw) = self.0.take() {
            sys::fd::close_raw(raw)?;
        }

        Ok(())
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(target: trace_categories::FDS, "failed to close descriptor: {e}");
        }
    }
}

#[cfg(unix)]
impl From<std::os::fd::OwnedFd> for Descriptor {
    fn from(fd: std::os::fd::OwnedFd) -> Self {
        use std::os::fd::IntoRawFd;
        Self(Some(fd.into_raw_fd()))
    }
}

#[cfg(windows)]
impl From<std::os::windows::io::OwnedHandle> for Descriptor {
    fn from(handle: std::os::windows::io::OwnedHandle) -> Self {
        use std::os::windows::io::IntoRawHandle;
        Self(Some(handle.into_raw_handle()))
    }
}

/// Creates a new unidirectional pipe, returning its read and write ends, in that order.
///
/// Both ends are created non-inheritable; the spawn engine makes the child's ends
/// visible to the child as part of wiring its standard streams.
pub fn pipe() -> Result<(Descriptor, Descriptor), error::Error> {
    let (reader, writer) = sys::pipes::pipe()?;
    Ok((reader, writer))
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn close_is_idempotent() -> anyhow::Result<()> {
        let (mut reader, mut writer) = pipe()?;
        assert!(reader.is_valid());

        writer.close()?;
        writer.close()?;
        assert!(!writer.is_valid());

        reader.close()?;
        assert!(reader.as_raw().is_none());
        Ok(())
    }

    #[test]
    fn pipe_carries_bytes() -> anyhow::Result<()> {
        let (reader, writer) = pipe()?;
        let mut writer = crate::FdWriter::new(writer);
        let mut reader = crate::FdReader::new(reader);

        writer.write_all(b"through the pipe")?;
        drop(writer);

        let mut received = String::new();
        reader.read_to_string(&mut received)?;
        assert_eq!(received, "through the pipe");
        Ok(())
    }

    #[test]
    fn into_raw_releases_ownership() -> anyhow::Result<()> {
        let (reader, _writer) = pipe()?;
        let raw = reader.into_raw();
        assert!(raw.is_some());

        // SAFETY: the descriptor was just released by `into_raw` and is still open.
        let mut reclaimed = unsafe { Descriptor::from_raw(raw.unwrap_or(-1)) };
        reclaimed.close()?;
        Ok(())
    }
}
