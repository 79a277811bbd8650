//! Byte streams over owned descriptors.

use crate::descriptor::Descriptor;
use crate::sys;

/// A readable byte stream that owns its descriptor and closes it when dropped.
///
/// A reader without a descriptor (for example, the stdout of a child whose
/// output was redirected elsewhere) behaves as an empty stream.
#[derive(Debug)]
pub struct FdReader {
    fd: Descriptor,
}

impl FdReader {
    /// Wraps the given descriptor.
    pub const fn new(fd: Descriptor) -> Self {
        Self { fd }
    }

    /// Returns a reader with no underlying descriptor.
    pub const fn detached() -> Self {
        Self::new(Descriptor::invalid())
    }

    /// Returns true if the reader has no underlying descriptor.
    pub const fn is_detached(&self) -> bool {
        !self.fd.is_valid()
    }

    /// Returns the underlying descriptor, giving up the stream.
    pub fn into_descriptor(self) -> Descriptor {
        self.fd
    }
}

impl std::io::Read for FdReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.fd.as_raw() {
            Some(raw) => sys::fd::read(raw, buf),
            None => Ok(0),
        }
    }
}

/// A writable byte stream that owns its descriptor and closes it when dropped.
///
/// Writing to a writer without a descriptor fails with
/// [`std::io::ErrorKind::NotConnected`].
#[derive(Debug)]
pub struct FdWriter {
    fd: Descriptor,
}

impl FdWriter {
    /// Wraps the given descriptor.
    pub const fn new(fd: Descriptor) -> Self {
        Self { fd }
    }

    /// Returns a writer with no underlying descriptor.
    pub const fn detached() -> Self {
        Self::new(Descriptor::invalid())
    }

    /// Returns true if the writer has no underlying descriptor.
    pub const fn is_detached(&self) -> bool {
        !self.fd.is_valid()
    }

    /// Returns the underlying descriptor, giving up the stream.
    pub fn into_descriptor(self) -> Descriptor {
        self.fd
    }
}

impl std::io::Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.fd.as_raw() {
            Some(raw) => sys::fd::write(raw, buf),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "stream is not connected to the child process",
            )),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // Writes go straight to the descriptor; there is nothing buffered.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn detached_reader_is_empty() -> anyhow::Result<()> {
        let mut reader = FdReader::detached();
        assert!(reader.is_detached());

        let mut buf = Vec::new();
        assert_eq!(reader.read_to_end(&mut buf)?, 0);
        Ok(())
    }

    #[test]
    fn detached_writer_rejects_writes() {
        let mut writer = FdWriter::detached();
        let err = writer.write(b"x").err();
        assert_eq!(
            err.map(|e| e.kind()),
            Some(std::io::ErrorKind::NotConnected)
        );
    }
}
