//! Command-line front end for `spawnkit_core`: runs one command with file
//! redirection, environment overrides, and an optional timeout.

/// Command-line arguments.
pub mod args;
/// Configuration file support.
pub mod config;
/// Process entry point.
pub mod entry;
/// Error types and exit codes.
pub mod error;
mod events;
/// Running and supervising the command.
pub mod run;

pub use events::TraceEvent;
