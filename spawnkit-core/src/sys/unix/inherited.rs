//! Closing of descriptors inherited across `fork`.
//!
//! Everything here runs in the child between `fork` and `exec`, so it must stay
//! async-signal-safe: raw system calls and stack buffers only, no allocation, no
//! locking, no logging, no panicking paths.

use std::os::fd::RawFd;

use nix::libc;

/// Upper bound used for brute-force closing when the system reports no limit.
const FALLBACK_DESCRIPTOR_LIMIT: RawFd = 1024;

/// How inherited descriptors were closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CloseStrategy {
    /// Open descriptors were enumerated from the process's descriptor directory.
    DirectoryScan,
    /// Every descriptor number up to the descriptor limit was closed.
    BruteForce,
}

/// Returns the exclusive upper bound for brute-force closing. Called by the parent
/// before forking.
pub(crate) fn descriptor_limit() -> RawFd {
    // SAFETY: sysconf has no memory-safety preconditions.
    let limit = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
    if limit <= 0 {
        return FALLBACK_DESCRIPTOR_LIMIT;
    }

    RawFd::try_from(limit).unwrap_or(RawFd::MAX)
}

/// Closes every descriptor numbered `first` or higher except `keep`. Tries the
/// directory scan first and falls back to brute force when it is unavailable.
pub(crate) fn close_inherited(first: RawFd, keep: RawFd, limit: RawFd) -> CloseStrategy {
    if close_by_directory_scan(first, keep) {
        CloseStrategy::DirectoryScan
    } else {
        close_by_brute_force(first, keep, limit);
        CloseStrategy::BruteForce
    }
}

/// Closes every descriptor in `first..limit` except `keep`, ignoring descriptors
/// that are not open.
pub(crate) fn close_by_brute_force(first: RawFd, keep: RawFd, limit: RawFd) {
    for fd in first..limit {
        if fd != keep {
            // SAFETY: closing an unowned or unused descriptor in the child only
            // affects the child; EBADF is expected and ignored.
            unsafe { libc::close(fd) };
        }
    }
}

/// Enumerates `/proc/self/fd` with raw `getdents64` calls into a stack buffer and
/// closes every listed descriptor numbered `first` or higher except `keep`.
///
/// Returns false if the directory could not be opened or read, in which case
/// some descriptors may already have been closed.
#[cfg(target_os = "linux")]
pub(crate) fn close_by_directory_scan(first: RawFd, keep: RawFd) -> bool {
    const FD_DIR: &std::ffi::CStr = c"/proc/self/fd";

    // Offsets within a `linux_dirent64` record.
    const RECLEN_OFFSET: usize = 16;
    const NAME_OFFSET: usize = 19;

    // SAFETY: FD_DIR is a valid NUL-terminated path.
    let dir = unsafe {
        libc::open(
            FD_DIR.as_ptr(),
            libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC,
        )
    };
    if dir < 0 {
        return false;
    }

    let mut buf = [0u8; 1024];
    let completed = loop {
        // SAFETY: `buf` is a writable region of `buf.len()` bytes.
        let read = unsafe { libc::syscall(libc::SYS_getdents64, dir, buf.as_mut_ptr(), buf.len()) };
        if read == 0 {
            break true;
        }
        let Ok(len) = usize::try_from(read) else {
            break false;
        };

        let mut offset = 0;
        while offset < len {
            let Some(reclen) = buf
                .get(offset + RECLEN_OFFSET..offset + RECLEN_OFFSET + 2)
                .and_then(|bytes| <[u8; 2]>::try_from(bytes).ok())
                .map(|bytes| usize::from(u16::from_ne_bytes(bytes)))
            else {
                break;
            };
            if reclen == 0 {
                break;
            }

            if let Some(fd) = buf
                .get(offset + NAME_OFFSET..offset + reclen)
                .and_then(parse_descriptor_name)
            {
                if fd >= first && fd != keep && fd != dir {
                    // SAFETY: closing a listed descriptor in the child only affects the child.
                    unsafe { libc::close(fd) };
                }
            }

            offset += reclen;
        }
    };

    // SAFETY: `dir` was opened above and is not used afterwards.
    unsafe { libc::close(dir) };
    completed
}

/// The directory scan requires allocation-free enumeration, which only Linux
/// provides; other systems always take the brute-force path.
#[cfg(not(target_os = "linux"))]
pub(crate) const fn close_by_directory_scan(_first: RawFd, _keep: RawFd) -> bool {
    false
}

/// Parses a NUL-terminated decimal directory entry name. Rejects `.`, `..`, and
/// anything else that is not a plain number.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_descriptor_name(name: &[u8]) -> Option<RawFd> {
    let mut value: RawFd = 0;
    let mut digits = 0;

    for &byte in name {
        if byte == 0 {
            break;
        }
        if !byte.is_ascii_digit() {
            return None;
        }

        value = value
            .checked_mul(10)?
            .checked_add(RawFd::from(byte - b'0'))?;
        digits += 1;
    }

    (digits > 0).then_some(value)
}

#[cfg(test)]
mod tests {
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    use nix::sys::wait::{WaitStatus, waitpid};
    use nix::unistd::{ForkResult, fork};

    use super::*;

    fn duplicate_above(fd: RawFd, floor: RawFd) -> anyhow::Result<OwnedFd> {
        // SAFETY: duplicating an open descriptor; the copy is owned by the result.
        let copy = unsafe { libc::fcntl(fd, libc::F_DUPFD, floor) };
        anyhow::ensure!(copy >= floor, "failed to duplicate descriptor");
        // SAFETY: `copy` was just opened and nothing else owns it.
        Ok(unsafe { OwnedFd::from_raw_fd(copy) })
    }

    fn is_open(fd: RawFd) -> bool {
        // SAFETY: F_GETFD only queries the descriptor.
        unsafe { libc::fcntl(fd, libc::F_GETFD) >= 0 }
    }

    /// Runs `close` in a forked child over an extra descriptor and a kept one,
    /// and returns the strategy it reports plus whether each descriptor is open
    /// afterwards.
    fn closes_in_child(
        close: impl FnOnce(RawFd, RawFd) -> CloseStrategy,
    ) -> anyhow::Result<(CloseStrategy, bool, bool)> {
        let file = tempfile::tempfile()?;
        let extra = duplicate_above(file.as_raw_fd(), 50)?;
        let keep = duplicate_above(file.as_raw_fd(), 60)?;
        let (extra_raw, keep_raw) = (extra.as_raw_fd(), keep.as_raw_fd());

        // SAFETY: the child only makes raw system calls and ends in `_exit`.
        match unsafe { fork() }? {
            ForkResult::Child => {
                let strategy_bit = match close(3, keep_raw) {
                    CloseStrategy::DirectoryScan => 4,
                    CloseStrategy::BruteForce => 8,
                };
                let code = strategy_bit + i32::from(is_open(extra_raw)) + 2 * i32::from(is_open(keep_raw));
                // SAFETY: `_exit` is async-signal-safe.
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => match waitpid(child, None)? {
                WaitStatus::Exited(_, code) => {
                    let strategy = if code & 8 == 0 {
                        CloseStrategy::DirectoryScan
                    } else {
                        CloseStrategy::BruteForce
                    };
                    Ok((strategy, code & 1 != 0, code & 2 != 0))
                }
                other => anyhow::bail!("child ended unexpectedly: {other:?}"),
            },
        }
    }

    #[test]
    fn brute_force_closes_all_but_the_kept_descriptor() -> anyhow::Result<()> {
        let limit = descriptor_limit();
        let outcome = closes_in_child(|first, keep| {
            close_by_brute_force(first, keep, limit);
            CloseStrategy::BruteForce
        })?;

        assert_eq!(outcome, (CloseStrategy::BruteForce, false, true));
        Ok(())
    }

    #[test]
    fn close_inherited_closes_all_but_the_kept_descriptor() -> anyhow::Result<()> {
        let limit = descriptor_limit();
        let (strategy, extra_open, keep_open) = closes_in_child(|first, keep| close_inherited(first, keep, limit))?;

        #[cfg(target_os = "linux")]
        assert_eq!(strategy, CloseStrategy::DirectoryScan);
        #[cfg(not(target_os = "linux"))]
        assert_eq!(strategy, CloseStrategy::BruteForce);

        assert!(!extra_open);
        assert!(keep_open);
        Ok(())
    }

    #[test]
    fn descriptor_names() {
        assert_eq!(parse_descriptor_name(b"17\0\0\0"), Some(17));
        assert_eq!(parse_descriptor_name(b"3"), Some(3));
        assert_eq!(parse_descriptor_name(b".\0"), None);
        assert_eq!(parse_descriptor_name(b"..\0"), None);
        assert_eq!(parse_descriptor_name(b"\0"), None);
        assert_eq!(parse_descriptor_name(b"99999999999\0"), None);
    }

    #[test]
    fn limit_is_positive() {
        assert!(descriptor_limit() > 2);
    }
}
