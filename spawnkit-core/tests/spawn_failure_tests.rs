//! Resource accounting around failed spawns.
//!
//! Counts this process's open descriptors, so it lives in its own test binary
//! with a single test.

#![cfg(target_os = "linux")]
#![allow(clippy::panic_in_result_fn)]

use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use pretty_assertions::assert_eq;
use spawnkit_core::ProcessBuilder;

fn open_descriptors() -> anyhow::Result<usize> {
    Ok(std::fs::read_dir("/proc/self/fd")?.count())
}

#[test]
fn failed_spawns_leak_no_descriptors_or_children() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let before = open_descriptors()?;

    for _ in 0..4 {
        let missing = ProcessBuilder::new()
            .command("spawnkit-test-no-such-command")
            .start();
        assert!(missing.is_err_and(|e| e.is_not_found()));

        let bad_cwd = ProcessBuilder::new()
            .command("/bin/sh")
            .arguments(["-c", "true"])
            .directory(dir.path().join("gone"))
            .start();
        assert!(bad_cwd.is_err());
    }

    assert_eq!(open_descriptors()?, before);

    // Every failed child was reaped before `start` returned.
    match waitpid(None::<Pid>, Some(WaitPidFlag::WNOHANG)) {
        Err(Errno::ECHILD) | Ok(WaitStatus::StillAlive) => (),
        other => anyhow::bail!("unexpected child left behind: {other:?}"),
    }
    Ok(())
}
