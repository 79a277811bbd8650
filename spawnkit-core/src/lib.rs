//! Child-process management: builds a launch specification, spawns a process with
//! controllable standard-stream redirection and environment, and manages its
//! lifecycle (polling, waiting, termination) until exit.
//!
//! ```no_run
//! use std::io::{Read, Write};
//!
//! # fn main() -> Result<(), spawnkit_core::Error> {
//! let mut child = spawnkit_core::ProcessBuilder::new()
//!     .command("/bin/sh")
//!     .environment("GREETING", "hi")
//!     .start()?;
//!
//! child.stdin().write_all(b"echo $GREETING; exit 3\n")?;
//! let exit_code = child.wait_for()?;
//!
//! let mut output = String::new();
//! child.stdout().read_to_string(&mut output)?;
//! assert_eq!(output, "hi\n");
//! assert_eq!(exit_code, 3);
//! # Ok(())
//! # }
//! ```

mod builder;
mod descriptor;
mod error;
mod fdstream;
mod launch;
mod pathsearch;
mod process;
mod redirect;
mod status;
mod sys;
pub mod trace_categories;

pub use builder::ProcessBuilder;
pub use descriptor::{AsRawDescriptor, Descriptor, RawDescriptor, pipe};
pub use error::Error;
pub use fdstream::{FdReader, FdWriter};
pub use launch::{LaunchSpec, RedirectTarget, StdStream};
pub use pathsearch::SearchPath;
pub use process::{ProcessHandle, ProcessId, exec, exec_with_args};
pub use status::ProcessStatus;
