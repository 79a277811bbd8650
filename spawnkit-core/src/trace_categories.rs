//! Trace utilities

/// Trace category for descriptor lifecycle.
pub const FDS: &str = "fds";
/// Trace category for spawning and exec outcomes.
pub const SPAWN: &str = "spawn";
/// Trace category for polling, waiting, and reaping.
pub const WAIT: &str = "wait";
