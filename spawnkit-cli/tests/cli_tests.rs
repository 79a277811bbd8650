//! Tests that drive the `spawnkit` binary end to end.

// These rely on `/bin/sh` and POSIX utilities.
#![cfg(unix)]
#![allow(clippy::panic_in_result_fn)]

use assert_cmd::Command;
use predicates::prelude::*;

fn spawnkit() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("spawnkit"));
    cmd.arg("--no-config");
    cmd
}

#[test]
fn exit_code_is_passed_through() -> anyhow::Result<()> {
    spawnkit()
        .args(["/bin/sh", "-c", "exit 42"])
        .assert()
        .code(42);
    Ok(())
}

#[test]
fn inherited_streams_reach_the_caller() -> anyhow::Result<()> {
    spawnkit()
        .args(["/bin/sh", "-c", "read line; echo \"got $line\"; echo oops 1>&2"])
        .write_stdin("input\n")
        .assert()
        .success()
        .stdout("got input\n")
        .stderr(predicate::str::contains("oops"));
    Ok(())
}

#[test]
fn merged_outputs_follow_stdout() -> anyhow::Result<()> {
    spawnkit()
        .args(["--merge-outputs", "/bin/sh", "-c", "echo err 1>&2"])
        .assert()
        .success()
        .stdout("err\n")
        .stderr("");
    Ok(())
}

#[test]
fn environment_and_directory_are_applied() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("marker"), "")?;

    spawnkit()
        .args(["-e", "GREETING=hello", "-C"])
        .arg(dir.path())
        .args(["/bin/sh", "-c", "echo $GREETING; ls"])
        .assert()
        .success()
        .stdout("hello\nmarker\n");
    Ok(())
}

#[test]
fn cleared_environment_only_has_overrides() -> anyhow::Result<()> {
    spawnkit()
        .args(["--clear-env", "-e", "ONLY=1", "/usr/bin/env"])
        .assert()
        .success()
        .stdout("ONLY=1\n");
    Ok(())
}

#[test]
fn output_can_be_redirected_to_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    std::fs::write(&input, "from file\n")?;

    spawnkit()
        .arg("--stdin")
        .arg(&input)
        .arg("--stdout")
        .arg(&output)
        .arg("cat")
        .assert()
        .success()
        .stdout("");

    assert_eq!(std::fs::read_to_string(&output)?, "from file\n");
    Ok(())
}

#[test]
fn missing_command_exits_127() -> anyhow::Result<()> {
    spawnkit()
        .arg("spawnkit-test-no-such-command")
        .assert()
        .code(127)
        .stderr(predicate::str::contains("No such file or directory"));
    Ok(())
}

#[test]
fn non_executable_command_exits_126() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let script = dir.path().join("locked");
    std::fs::write(&script, "echo never\n")?;

    spawnkit().arg(&script).assert().code(126);
    Ok(())
}

#[test]
fn timeout_terminates_the_command() -> anyhow::Result<()> {
    spawnkit()
        .args(["--timeout", "0.2", "sleep", "30"])
        .assert()
        .code(128 + 15);
    Ok(())
}

#[test]
fn unrepresentably_long_timeout_waits_normally() -> anyhow::Result<()> {
    spawnkit()
        .args(["--timeout", "1e19", "/bin/sh", "-c", "exit 3"])
        .assert()
        .code(3);
    Ok(())
}

#[test]
fn stubborn_command_is_killed_after_grace_period() -> anyhow::Result<()> {
    spawnkit()
        .args([
            "--timeout",
            "0.2",
            "--kill-after",
            "0.2",
            "/bin/sh",
            "-c",
            "trap '' TERM; while :; do sleep 0.05; done",
        ])
        .assert()
        .code(128 + 9);
    Ok(())
}

#[test]
fn config_file_supplies_defaults() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        "[process]\nmerge-outputs = true\n\n[env]\nFROM_CONFIG = \"yes\"\n",
    )?;

    Command::new(assert_cmd::cargo::cargo_bin!("spawnkit"))
        .arg("--config")
        .arg(&config)
        .args(["/bin/sh", "-c", "echo $FROM_CONFIG 1>&2"])
        .assert()
        .success()
        .stdout("yes\n");
    Ok(())
}

#[test]
fn broken_explicit_config_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[process\n")?;

    Command::new(assert_cmd::cargo::cargo_bin!("spawnkit"))
        .arg("--config")
        .arg(&config)
        .arg("true")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to parse config file"));
    Ok(())
}

#[test]
fn debug_events_are_logged() -> anyhow::Result<()> {
    spawnkit()
        .args(["--debug", "spawn", "true"])
        .assert()
        .success()
        .stderr(predicate::str::contains("spawned"));
    Ok(())
}
