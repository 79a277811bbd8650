pub(crate) mod fd;
pub(crate) mod pipes;
pub(crate) mod signal;
pub(crate) mod spawn;
pub(crate) mod wait;

use windows_sys::Win32::Foundation::HANDLE;

use crate::descriptor::Descriptor;

/// Raw descriptor type on Windows.
pub type RawDescriptor = std::os::windows::io::RawHandle;

/// Native process identifier on Windows.
pub type ProcessId = u32;

/// The OS-level identity of a spawned child: its process and primary thread
/// handles, both closed when the child is dropped.
#[derive(Debug)]
pub(crate) struct NativeChild {
    process: Descriptor,
    _thread: Descriptor,
    id: ProcessId,
}

impl NativeChild {
    pub const fn new(process: Descriptor, thread: Descriptor, id: ProcessId) -> Self {
        Self {
            process,
            _thread: thread,
            id,
        }
    }

    pub fn process_handle(&self) -> HANDLE {
        self.process.as_raw().unwrap_or(std::ptr::null_mut())
    }

    pub const fn id(&self) -> ProcessId {
        self.id
    }
}
