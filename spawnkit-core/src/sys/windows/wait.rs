use windows_sys::Win32::Foundation::{WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows_sys::Win32::System::Threading::{GetExitCodeProcess, INFINITE, WaitForSingleObject};

use crate::status::Termination;
use crate::sys::windows::NativeChild;
use crate::{error, trace_categories};

/// Blocks until the child exits and returns its exit code.
pub(crate) fn wait_for(child: &NativeChild) -> Result<Termination, error::Error> {
    // SAFETY: the process handle is owned by `child` and open.
    if unsafe { WaitForSingleObject(child.process_handle(), INFINITE) } == WAIT_FAILED {
        return Err(error::Error::WaitFailed(std::io::Error::last_os_error()));
    }

    let mut code = 0u32;
    // SAFETY: as above; `code` is a live local.
    if unsafe { GetExitCodeProcess(child.process_handle(), &raw mut code) } == 0 {
        return Err(error::Error::WaitFailed(std::io::Error::last_os_error()));
    }

    // Exit codes are reported bit-for-bit, as `std::process::ExitStatus` does.
    #[allow(clippy::cast_possible_wrap)]
    let code = code as i32;
    tracing::debug!(target: trace_categories::WAIT, "process {} finished with code {code}", child.id());

    Ok(Termination { code, reaped: true })
}

/// Returns true if the child has exited, without blocking.
pub(crate) fn has_exited(child: &NativeChild) -> Result<bool, error::Error> {
    // SAFETY: the process handle is owned by `child` and open.
    match unsafe { WaitForSingleObject(child.process_handle(), 0) } {
        WAIT_OBJECT_0 => Ok(true),
        WAIT_TIMEOUT => Ok(false),
        _ => Err(error::Error::WaitFailed(std::io::Error::last_os_error())),
    }
}
