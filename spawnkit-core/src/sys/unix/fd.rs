//! File descriptor utilities.

use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::libc;

/// Closes a raw descriptor. Not retried on `EINTR`: on Linux the descriptor is
/// released even when the call is interrupted.
pub(crate) fn close_raw(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: Closing a descriptor has no memory-safety implications; callers own `fd`.
    let result = unsafe { libc::close(fd) };
    Errno::result(result)?;
    Ok(())
}

/// Reads from a raw descriptor, retrying when interrupted by a signal.
pub(crate) fn read(fd: RawFd, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        // SAFETY: `buf` is a valid, writable region of `buf.len()` bytes.
        let result = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        match Errno::result(result) {
            Ok(n) => return Ok(usize::try_from(n).unwrap_or_default()),
            Err(Errno::EINTR) => (),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Writes to a raw descriptor, retrying when interrupted by a signal.
pub(crate) fn write(fd: RawFd, buf: &[u8]) -> std::io::Result<usize> {
    loop {
        // SAFETY: `buf` is a valid, readable region of `buf.len()` bytes.
        let result = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        match Errno::result(result) {
            Ok(n) => return Ok(usize::try_from(n).unwrap_or_default()),
            Err(Errno::EINTR) => (),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Reads until `buf` is full or end-of-file is reached; returns the number of bytes
/// read.
pub(crate) fn read_fully(fd: RawFd, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let Some(remaining) = buf.get_mut(filled..) else {
            break;
        };

        match read(fd, remaining)? {
            0 => break,
            n => filled += n,
        }
    }

    Ok(filled)
}

/// Sets or clears the close-on-exec flag of a descriptor. Async-signal-safe.
pub(crate) fn set_cloexec(fd: RawFd, cloexec: bool) -> std::io::Result<()> {
    let flags = if cloexec { libc::FD_CLOEXEC } else { 0 };
    // SAFETY: F_SETFD only updates descriptor flags.
    let result = unsafe { libc::fcntl(fd, libc::F_SETFD, flags) };
    Errno::result(result)?;
    Ok(())
}
