use windows_sys::Win32::Foundation::HANDLE;
use windows_sys::Win32::Security::SECURITY_ATTRIBUTES;
use windows_sys::Win32::System::Pipes::CreatePipe;

use crate::descriptor::Descriptor;
use crate::launch::StdStream;
use crate::sys::windows::fd;

/// Creates an anonymous pipe whose ends are not inherited by children.
pub(crate) fn pipe() -> std::io::Result<(Descriptor, Descriptor)> {
    create(false)
}

/// Creates a pipe for one of a child's standard streams. Only the end the child
/// uses stays inheritable: the read end for stdin, the write end otherwise.
pub(crate) fn child_pipe(stream: StdStream) -> std::io::Result<(Descriptor, Descriptor)> {
    let (read, write) = create(true)?;

    let parent_end = match stream {
        StdStream::Stdin => &write,
        StdStream::Stdout | StdStream::Stderr => &read,
    };
    if let Some(raw) = parent_end.as_raw() {
        fd::set_inheritable(raw, false)?;
    }

    Ok((read, write))
}

fn create(inheritable: bool) -> std::io::Result<(Descriptor, Descriptor)> {
    let attributes = SECURITY_ATTRIBUTES {
        nLength: u32::try_from(std::mem::size_of::<SECURITY_ATTRIBUTES>()).unwrap_or_default(),
        lpSecurityDescriptor: std::ptr::null_mut(),
        bInheritHandle: i32::from(inheritable),
    };

    let mut read: HANDLE = std::ptr::null_mut();
    let mut write: HANDLE = std::ptr::null_mut();

    // SAFETY: all pointers refer to live locals.
    if unsafe { CreatePipe(&raw mut read, &raw mut write, &raw const attributes, 0) } == 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: both handles were just created and are owned by nobody else.
    Ok(unsafe { (Descriptor::from_raw(read), Descriptor::from_raw(write)) })
}
