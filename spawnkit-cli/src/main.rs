//! Implements the `spawnkit` command.

#![deny(missing_docs)]

/// Main entry point for `spawnkit`.
fn main() {
    spawnkit_cli::entry::run();
}
