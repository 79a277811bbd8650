//! Pipe creation.

use crate::descriptor::Descriptor;

/// Creates a pipe whose ends are both close-on-exec, so that no concurrently
/// spawned child can carry them into its new image. Returns `(read, write)`.
pub(crate) fn pipe() -> std::io::Result<(Descriptor, Descriptor)> {
    cfg_if::cfg_if! {
        if #[cfg(any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "illumos",
            target_os = "linux",
            target_os = "netbsd",
            target_os = "openbsd",
            target_os = "solaris",
        ))] {
            let (reader, writer) = nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)?;
            Ok((reader.into(), writer.into()))
        } else {
            use std::os::fd::AsRawFd;

            // No atomic variant is available; there is a short window in which a
            // concurrent fork can inherit these descriptors.
            let (reader, writer) = nix::unistd::pipe()?;
            super::fd::set_cloexec(reader.as_raw_fd(), true)?;
            super::fd::set_cloexec(writer.as_raw_fd(), true)?;
            Ok((reader.into(), writer.into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::libc;

    #[test]
    fn pipe_ends_are_cloexec() -> anyhow::Result<()> {
        let (reader, writer) = pipe()?;
        for end in [&reader, &writer] {
            let Some(raw) = end.as_raw() else {
                anyhow::bail!("pipe end missing");
            };

            // SAFETY: querying descriptor flags of an open pipe end.
            let flags = unsafe { libc::fcntl(raw, libc::F_GETFD) };
            assert_eq!(flags & libc::FD_CLOEXEC, libc::FD_CLOEXEC);
        }
        Ok(())
    }
}
