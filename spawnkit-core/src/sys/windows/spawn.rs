//! Native process creation with inherited standard handles.
//!
//! `CreateProcessW` reports failures synchronously, so no fail pipe is needed.
//! The child's standard handles are inheritable pipe ends (or inheritable copies
//! of the caller's handles); every parent-side end is non-inheritable.

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use windows_sys::Win32::System::Threading::{
    CREATE_UNICODE_ENVIRONMENT, CreateProcessW, PROCESS_INFORMATION, STARTF_USESTDHANDLES, STARTUPINFOW,
};

use crate::descriptor::Descriptor;
use crate::fdstream::{FdReader, FdWriter};
use crate::launch::{LaunchSpec, StdStream};
use crate::pathsearch::SearchPath;
use crate::process::ProcessInfo;
use crate::redirect::{ResolvedStreams, StreamEnds};
use crate::sys::windows::{NativeChild, fd, pipes};
use crate::{error, trace_categories};

/// Spawns the process described by `spec`. `CreateProcessW` performs its own
/// executable search, so the search path is not consulted.
pub(crate) fn spawn(spec: &LaunchSpec, _search_path: &SearchPath) -> Result<ProcessInfo, error::Error> {
    let mut streams = ResolvedStreams::resolve(spec, pipes::child_pipe)?;

    // Caller-owned handles may not be inheritable; hand the child copies instead.
    // The copies are closed once the child holds its own.
    let mut copies = Vec::new();
    let mut child_handles = [std::ptr::null_mut(); 3];
    for ((slot, raw), stream) in child_handles
        .iter_mut()
        .zip(streams.child_ends())
        .zip([&streams.stdin, &streams.stdout, &streams.stderr])
    {
        let Some(raw) = raw else {
            continue;
        };

        *slot = match stream {
            StreamEnds::Caller(_) => {
                let copy = fd::inheritable_copy(raw)?;
                let copied = copy.as_raw().unwrap_or(std::ptr::null_mut());
                copies.push(copy);
                copied
            }
            StreamEnds::Pipe { .. } | StreamEnds::Unbound => raw,
        };
    }

    // Merged stderr reuses whatever stdout received, including a copy.
    if spec.merge_outputs {
        child_handles[2] = child_handles[1];
    }

    let mut command_line = to_wide(&command_line(&spec.cmdline));
    let environment = environment_block(spec);
    let cwd = to_wide(&spec.cwd.to_string_lossy());

    let startup_info = STARTUPINFOW {
        cb: u32::try_from(std::mem::size_of::<STARTUPINFOW>()).unwrap_or_default(),
        dwFlags: STARTF_USESTDHANDLES,
        hStdInput: child_handles[0],
        hStdOutput: child_handles[1],
        hStdError: child_handles[2],
        // SAFETY: STARTUPINFOW is plain data; zero is valid for every other field.
        ..unsafe { std::mem::zeroed() }
    };

    // SAFETY: PROCESS_INFORMATION is plain data that CreateProcessW fills in.
    let mut process_info: PROCESS_INFORMATION = unsafe { std::mem::zeroed() };

    // SAFETY: every pointer refers to a live, NUL-terminated buffer or struct.
    let created = unsafe {
        CreateProcessW(
            std::ptr::null(),
            command_line.as_mut_ptr(),
            std::ptr::null(),
            std::ptr::null(),
            1,
            CREATE_UNICODE_ENVIRONMENT,
            environment.as_ptr().cast(),
            cwd.as_ptr(),
            &raw const startup_info,
            &raw mut process_info,
        )
    };
    let create_error = (created == 0).then(std::io::Error::last_os_error);

    drop(copies);
    streams.close_child_ends();

    if let Some(source) = create_error {
        let e = error::Error::CreateProcess {
            command: spec.program().unwrap_or_default().to_owned(),
            source,
        };
        tracing::debug!(target: trace_categories::SPAWN, "spawn of {:?} failed: {e}", spec.cmdline);
        return Err(e);
    }

    tracing::debug!(
        target: trace_categories::SPAWN,
        "spawned {:?} as process {}",
        spec.cmdline,
        process_info.dwProcessId
    );

    // SAFETY: CreateProcessW succeeded, so both handles are open and now ours.
    let (process, thread) = unsafe {
        (
            Descriptor::from_raw(process_info.hProcess),
            Descriptor::from_raw(process_info.hThread),
        )
    };

    Ok(ProcessInfo {
        child: NativeChild::new(process, thread, process_info.dwProcessId),
        stdin: FdWriter::new(streams.stdin.take_parent_end(StdStream::Stdin)),
        stdout: FdReader::new(streams.stdout.take_parent_end(StdStream::Stdout)),
        stderr: FdReader::new(streams.stderr.take_parent_end(StdStream::Stderr)),
    })
}

/// Joins the tokens with spaces, quoting those that need it so that the
/// child's argument parser recovers them unchanged.
fn command_line(tokens: &[String]) -> String {
    let mut line = String::new();

    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        append_quoted(token, &mut line);
    }

    line
}

fn append_quoted(token: &str, line: &mut String) {
    let needs_quotes = token.is_empty() || token.contains([' ', '\t', '\n', '\u{b}', '"']);
    if !needs_quotes {
        line.push_str(token);
        return;
    }

    line.push('"');

    let mut backslashes = 0;
    for c in token.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                // Backslashes before a quote are doubled, and the quote is escaped.
                line.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                line.push('"');
                backslashes = 0;
            }
            _ => {
                line.extend(std::iter::repeat_n('\\', backslashes));
                line.push(c);
                backslashes = 0;
            }
        }
    }

    // Backslashes before the closing quote are doubled too.
    line.extend(std::iter::repeat_n('\\', backslashes * 2));
    line.push('"');
}

/// Builds a `KEY=VALUE\0...\0\0` UTF-16 block, sorted case-insensitively by key.
fn environment_block(spec: &LaunchSpec) -> Vec<u16> {
    let mut entries: Vec<_> = spec.effective_env().into_iter().collect();
    entries.sort_by_key(|(key, _)| key.to_uppercase());

    let mut block = Vec::new();
    for (key, value) in entries {
        block.extend(OsStr::new(&format!("{key}={value}")).encode_wide());
        block.push(0);
    }

    // An empty block still needs its terminator pair.
    if block.is_empty() {
        block.push(0);
    }
    block.push(0);

    block
}

fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}
