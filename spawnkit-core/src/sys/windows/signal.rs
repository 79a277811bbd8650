use windows_sys::Win32::System::Threading::TerminateProcess;

use crate::error;
use crate::sys::windows::NativeChild;

/// Exit code given to a terminated child.
const TERMINATED_EXIT_CODE: u32 = 1;

/// Terminates the child. Windows has no graceful counterpart to SIGTERM, so
/// `force` makes no difference.
pub(crate) fn terminate(child: &NativeChild, _force: bool) -> Result<(), error::Error> {
    // SAFETY: the process handle is owned by `child` and open.
    if unsafe { TerminateProcess(child.process_handle(), TERMINATED_EXIT_CODE) } == 0 {
        return Err(error::Error::FailedToSendSignal(child.id()));
    }
    Ok(())
}
