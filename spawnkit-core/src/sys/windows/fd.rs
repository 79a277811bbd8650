//! Handle utilities.

use windows_sys::Win32::Foundation::{
    CloseHandle, DUPLICATE_SAME_ACCESS, DuplicateHandle, ERROR_BROKEN_PIPE, HANDLE, HANDLE_FLAG_INHERIT,
    SetHandleInformation,
};
use windows_sys::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use windows_sys::Win32::System::Threading::GetCurrentProcess;

use crate::descriptor::Descriptor;

/// Closes a raw handle.
pub(crate) fn close_raw(handle: HANDLE) -> std::io::Result<()> {
    // SAFETY: callers own `handle`.
    if unsafe { CloseHandle(handle) } == 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Reads from a raw handle. A pipe whose writer has gone away reads as end-of-file.
pub(crate) fn read(handle: HANDLE, buf: &mut [u8]) -> std::io::Result<usize> {
    let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
    let mut read = 0u32;

    // SAFETY: `buf` is a valid, writable region of at least `len` bytes.
    let ok = unsafe { ReadFile(handle, buf.as_mut_ptr(), len, &raw mut read, std::ptr::null_mut()) };
    if ok == 0 {
        let error = std::io::Error::last_os_error();
        #[allow(clippy::cast_possible_wrap)]
        if error.raw_os_error() == Some(ERROR_BROKEN_PIPE as i32) {
            return Ok(0);
        }
        return Err(error);
    }

    Ok(read as usize)
}

/// Writes to a raw handle.
pub(crate) fn write(handle: HANDLE, buf: &[u8]) -> std::io::Result<usize> {
    let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
    let mut written = 0u32;

    // SAFETY: `buf` is a valid, readable region of at least `len` bytes.
    let ok = unsafe { WriteFile(handle, buf.as_ptr(), len, &raw mut written, std::ptr::null_mut()) };
    if ok == 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(written as usize)
}

/// Sets or clears whether a handle is inherited by child processes.
pub(crate) fn set_inheritable(handle: HANDLE, inheritable: bool) -> std::io::Result<()> {
    let flags = if inheritable { HANDLE_FLAG_INHERIT } else { 0 };

    // SAFETY: only updates the handle's flags.
    if unsafe { SetHandleInformation(handle, HANDLE_FLAG_INHERIT, flags) } == 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Returns an inheritable duplicate of a handle owned by someone else. The
/// original is left untouched.
pub(crate) fn inheritable_copy(handle: HANDLE) -> std::io::Result<Descriptor> {
    let mut copy: HANDLE = std::ptr::null_mut();

    // SAFETY: `handle` is an open handle lent to us by the caller.
    let ok = unsafe {
        DuplicateHandle(
            GetCurrentProcess(),
            handle,
            GetCurrentProcess(),
            &raw mut copy,
            0,
            1,
            DUPLICATE_SAME_ACCESS,
        )
    };
    if ok == 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: `copy` was just created and is owned by nobody else.
    Ok(unsafe { Descriptor::from_raw(copy) })
}
