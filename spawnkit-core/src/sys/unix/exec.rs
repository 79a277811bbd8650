//! Executable resolution and image replacement.
//!
//! An [`ExecPlan`] is assembled by the parent before forking. It holds every
//! C string and pointer vector the child needs, so that the child can search
//! `PATH`, fall back to the shell for scripts without a shebang line, and call
//! `execve` without allocating.

use std::ffi::{CStr, CString, c_char};
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use nix::errno::Errno;
use nix::libc;

use crate::error;
use crate::launch::LaunchSpec;
use crate::pathsearch::{self, SearchPath};

/// Shell used to run executables that the kernel does not recognize.
const FALLBACK_SHELL: &CStr = c"/bin/sh";

/// What the child should try to execute.
#[derive(Debug)]
enum Target {
    /// The command was empty.
    Empty,
    /// The command contains a path separator and is executed as given.
    Direct(CString),
    /// The command is a bare name; each candidate is tried in order.
    Search(Vec<CString>),
}

/// Everything the child needs to execute the command without allocating.
pub(crate) struct ExecPlan {
    target: Target,
    cwd: CString,

    // Owned strings backing the pointer vectors below. Moving a `CString` does not
    // move its heap buffer, so the pointers stay valid for the plan's lifetime.
    _argv: Vec<CString>,
    _envp: Vec<CString>,

    argv_ptrs: Vec<*const c_char>,
    script_argv_ptrs: Vec<*const c_char>,
    envp_ptrs: Vec<*const c_char>,
}

impl ExecPlan {
    /// Marshals the command line, environment, working directory, and executable
    /// candidates of `spec` into C form.
    pub fn new(spec: &LaunchSpec, search_path: &SearchPath) -> Result<Self, error::Error> {
        let argv = spec
            .cmdline
            .iter()
            .map(|arg| to_cstring(arg.as_bytes(), "argument"))
            .collect::<Result<Vec<_>, _>>()?;

        let envp = spec
            .effective_env()
            .into_iter()
            .map(|(key, value)| to_cstring(format!("{key}={value}").into_bytes(), "environment entry"))
            .collect::<Result<Vec<_>, _>>()?;

        let cwd = to_cstring(spec.cwd.as_os_str().as_bytes(), "working directory")?;

        let command = spec.program().unwrap_or_default();
        let target = if command.is_empty() {
            Target::Empty
        } else if pathsearch::contains_separator(command) {
            Target::Direct(to_cstring(command.as_bytes(), "command")?)
        } else {
            Target::Search(
                search_path
                    .candidates(command)
                    .filter_map(|candidate| CString::new(candidate.into_os_string().into_vec()).ok())
                    .collect(),
            )
        };

        let argv_ptrs = null_terminated(&argv);
        let envp_ptrs = null_terminated(&envp);

        // [shell, <script path>, argv[1..]..., NULL]; the script slot is filled in by
        // the child once it knows which candidate it is executing.
        let mut script_argv_ptrs = Vec::with_capacity(argv.len() + 2);
        script_argv_ptrs.push(FALLBACK_SHELL.as_ptr());
        script_argv_ptrs.push(std::ptr::null());
        script_argv_ptrs.extend(argv.iter().skip(1).map(|arg| arg.as_ptr()));
        script_argv_ptrs.push(std::ptr::null());

        Ok(Self {
            target,
            cwd,
            _argv: argv,
            _envp: envp,
            argv_ptrs,
            script_argv_ptrs,
            envp_ptrs,
        })
    }

    /// The working directory the child should switch to.
    pub fn cwd(&self) -> &CStr {
        &self.cwd
    }

    /// Replaces the current process image. Only returns on failure, yielding the
    /// errno to report. Async-signal-safe.
    pub fn execute(&mut self) -> i32 {
        let Self {
            target,
            argv_ptrs,
            script_argv_ptrs,
            envp_ptrs,
            ..
        } = self;

        match target {
            Target::Empty => libc::ENOENT,
            Target::Direct(path) => exec_or_script(path, argv_ptrs, script_argv_ptrs, envp_ptrs),
            Target::Search(candidates) => {
                let mut sticky_errno = 0;

                for candidate in candidates.iter() {
                    let errno = exec_or_script(candidate, argv_ptrs, script_argv_ptrs, envp_ptrs);
                    match errno {
                        // Remember that something was found but not executable, and
                        // keep looking for a usable candidate.
                        libc::EACCES => sticky_errno = errno,
                        libc::ENOENT
                        | libc::ENOTDIR
                        | libc::ELOOP
                        | libc::ESTALE
                        | libc::ENODEV
                        | libc::ETIMEDOUT => (),
                        _ => return errno,
                    }
                }

                if sticky_errno != 0 {
                    sticky_errno
                } else {
                    libc::ENOENT
                }
            }
        }
    }
}

/// Executes `path`; if the kernel rejects it as an unrecognized format, runs it
/// through the fallback shell instead. Returns the errno of the failed attempt.
fn exec_or_script(
    path: &CStr,
    argv: &[*const c_char],
    script_argv: &mut [*const c_char],
    envp: &[*const c_char],
) -> i32 {
    // SAFETY: `path` is NUL-terminated and `argv`/`envp` are NULL-terminated arrays
    // of pointers into strings owned by the plan.
    unsafe { libc::execve(path.as_ptr(), argv.as_ptr(), envp.as_ptr()) };

    let errno = Errno::last() as i32;
    if errno != libc::ENOEXEC {
        return errno;
    }

    if let Some(slot) = script_argv.get_mut(1) {
        *slot = path.as_ptr();

        // SAFETY: as above; the script slot now points at `path`.
        unsafe { libc::execve(FALLBACK_SHELL.as_ptr(), script_argv.as_ptr(), envp.as_ptr()) };
    }

    // The shell could not be run either; report the original problem.
    libc::ENOEXEC
}

fn to_cstring(bytes: impl Into<Vec<u8>>, what: &str) -> Result<CString, error::Error> {
    CString::new(bytes)
        .map_err(|e| error::Error::InvalidArgument(format!("{what} contains a NUL byte: {e}")))
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec_for(cmdline: &[&str]) -> LaunchSpec {
        LaunchSpec {
            cmdline: cmdline.iter().map(ToString::to_string).collect(),
            inherit_env: false,
            ..LaunchSpec::default()
        }
    }

    #[test]
    fn bare_names_are_searched() -> anyhow::Result<()> {
        let plan = ExecPlan::new(&spec_for(&["tool", "-x"]), &SearchPath::parse("/a::/b"))?;
        match &plan.target {
            Target::Search(candidates) => assert_eq!(
                candidates.iter().map(|c| c.to_bytes()).collect::<Vec<_>>(),
                vec![&b"/a/tool"[..], b"./tool", b"/b/tool"]
            ),
            other => anyhow::bail!("unexpected target: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn paths_are_executed_directly() -> anyhow::Result<()> {
        let plan = ExecPlan::new(&spec_for(&["./tool"]), &SearchPath::parse("/a"))?;
        assert!(matches!(plan.target, Target::Direct(ref p) if p.as_bytes() == b"./tool"));
        Ok(())
    }

    #[test]
    fn vectors_are_null_terminated() -> anyhow::Result<()> {
        let plan = ExecPlan::new(&spec_for(&["echo", "a", "b"]), &SearchPath::parse("/bin"))?;
        assert_eq!(plan.argv_ptrs.len(), 4);
        assert!(plan.argv_ptrs.last().is_some_and(|p| p.is_null()));

        // shell, script slot, "a", "b", NULL
        assert_eq!(plan.script_argv_ptrs.len(), 5);
        assert!(plan.script_argv_ptrs.last().is_some_and(|p| p.is_null()));
        assert!(plan.envp_ptrs.last().is_some_and(|p| p.is_null()));
        Ok(())
    }

    #[test]
    fn environment_is_rendered_as_key_value() -> anyhow::Result<()> {
        let mut spec = spec_for(&["env"]);
        spec.env.insert("A".into(), "1".into());
        let plan = ExecPlan::new(&spec, &SearchPath::parse("/bin"))?;
        assert_eq!(
            plan._envp.iter().map(|e| e.to_bytes()).collect::<Vec<_>>(),
            vec![&b"A=1"[..]]
        );
        Ok(())
    }

    /// Runs the plan in a forked child and returns the errno it reports.
    fn failed_errno(mut plan: ExecPlan) -> anyhow::Result<i32> {
        use nix::sys::wait::{WaitStatus, waitpid};
        use nix::unistd::{ForkResult, fork};

        // SAFETY: the child only runs the prepared plan and exits.
        match unsafe { fork() }? {
            ForkResult::Child => {
                let errno = plan.execute();
                // SAFETY: `_exit` is async-signal-safe.
                unsafe { libc::_exit(errno) }
            }
            ForkResult::Parent { child } => match waitpid(child, None)? {
                WaitStatus::Exited(_, code) => Ok(code),
                other => anyhow::bail!("unexpected status: {other:?}"),
            },
        }
    }

    #[test]
    fn permission_denied_outranks_not_found() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let tool = dir.path().join("tool");
        std::fs::write(&tool, "exit 0\n")?;
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644))?;

        let missing = dir.path().join("missing");
        let search_path = SearchPath::parse(format!("{}:{}", missing.display(), dir.path().display()));
        let plan = ExecPlan::new(&spec_for(&["tool"]), &search_path)?;

        assert_eq!(failed_errno(plan)?, libc::EACCES);
        Ok(())
    }

    #[test]
    fn exhausted_search_is_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let plan = ExecPlan::new(&spec_for(&["tool"]), &SearchPath::parse(dir.path()))?;

        assert_eq!(failed_errno(plan)?, libc::ENOENT);
        Ok(())
    }

    #[test]
    fn interior_nul_is_rejected() {
        let result = ExecPlan::new(&spec_for(&["echo", "a\0b"]), &SearchPath::parse("/bin"));
        assert!(matches!(result, Err(error::Error::InvalidArgument(_))));
    }
}
