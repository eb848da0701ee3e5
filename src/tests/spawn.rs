// These tests drive real child processes; the Unix commands they use (sh,
// cat, printf, sleep) are expected to be present in Windows CI as well.

use std::fs;
use std::io::Write;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::{
    Error, Handle, Redirect, WaitError, create_pipe, open_for_read, open_for_write, run_sync,
    spawn, wait, wait_all,
};

#[test]
fn good_cmd() {
    let mut redirect = Redirect::new();
    run_sync(&["true"], &mut redirect, true).unwrap();
}

#[test]
fn bad_cmd() {
    let mut redirect = Redirect::new();
    match spawn(&["nosuchcommand"], &mut redirect, true) {
        Err(Error::SpawnFailure(msg)) => {
            assert!(msg.contains("nosuchcommand"), "message was: {}", msg);
            assert!(msg.contains("No such file"), "message was: {}", msg);
        }
        other => panic!("expected SpawnFailure, got {:?}", other),
    }
}

#[test]
fn reject_empty_argv() {
    let mut redirect = Redirect::new();
    let result = spawn(&[""; 0], &mut redirect, true);
    assert_eq!(result.unwrap_err(), Error::EmptyCommand);
}

#[test]
fn null_byte_in_cmd() {
    let mut redirect = Redirect::new();
    assert!(matches!(
        spawn(&["echo\0foo"], &mut redirect, true),
        Err(Error::SpawnFailure(_))
    ));
}

#[test]
fn err_exit_carries_code() {
    let mut redirect = Redirect::new();
    let result = run_sync(&["sh", "-c", "exit 7"], &mut redirect, true);
    assert_eq!(
        result.unwrap_err(),
        Error::WaitFailure(WaitError::NonZeroExit(7))
    );
}

#[test]
fn wait_on_invalid_handle() {
    let handle = Handle::invalid();
    assert!(!handle.is_valid());
    let start = Instant::now();
    assert_eq!(wait(handle), Err(Error::InvalidHandle));
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[cfg(unix)]
#[test]
fn signal_termination_is_abnormal() {
    let mut redirect = Redirect::new();
    let result = run_sync(&["sh", "-c", "kill -TERM $$"], &mut redirect, true);
    assert_eq!(
        result.unwrap_err(),
        Error::WaitFailure(WaitError::Abnormal(libc::SIGTERM))
    );
}

#[test]
fn wait_all_short_circuits_on_first_failure() {
    let mut redirect = Redirect::new();
    let h1 = spawn(&["true"], &mut redirect, true).unwrap();
    let h2 = spawn(&["sh", "-c", "exit 3"], &mut redirect, true).unwrap();
    let h3 = spawn(&["sleep", "10"], &mut redirect, true).unwrap();

    let start = Instant::now();
    let result = wait_all([h1, h2, h3]);
    assert_eq!(
        result.unwrap_err(),
        Error::WaitFailure(WaitError::NonZeroExit(3))
    );
    // h3 was dropped, not waited on
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "wait_all blocked on a handle past the first failure"
    );
}

#[test]
fn wait_all_success() {
    let mut redirect = Redirect::new();
    let h1 = spawn(&["true"], &mut redirect, true).unwrap();
    let h2 = spawn(&["true"], &mut redirect, true).unwrap();
    wait_all([h1, h2]).unwrap();
}

#[test]
fn redirect_reset_after_successful_spawn() {
    let (read_end, write_end) = create_pipe().unwrap();
    let mut redirect = Redirect::new();
    redirect.stdin = read_end;
    redirect.stdout = write_end;

    let handle = spawn(&["true"], &mut redirect, true).unwrap();
    assert!(!redirect.stdin.is_valid());
    assert!(!redirect.stdout.is_valid());
    assert!(!redirect.stderr.is_valid());
    wait(handle).ok();
}

#[test]
fn redirect_reset_after_failed_spawn() {
    let tmpdir = TempDir::new().unwrap();
    let mut redirect = Redirect::new();
    redirect.stdout = open_for_write(tmpdir.path().join("out")).unwrap();

    assert!(spawn(&["nosuchcommand"], &mut redirect, true).is_err());
    assert!(!redirect.stdout.is_valid());
}

#[test]
fn redirect_survives_with_reset_false() {
    let tmpdir = TempDir::new().unwrap();
    let mut redirect = Redirect::new();
    redirect.stdout = open_for_write(tmpdir.path().join("out")).unwrap();

    let handle = spawn(&["true"], &mut redirect, false).unwrap();
    assert!(redirect.stdout.is_valid());
    wait(handle).unwrap();

    // still usable for a second spawn
    let handle = spawn(&["true"], &mut redirect, true).unwrap();
    assert!(!redirect.stdout.is_valid());
    wait(handle).unwrap();
}

#[test]
fn output_to_file() {
    let tmpdir = TempDir::new().unwrap();
    let path = tmpdir.path().join("output");
    let mut redirect = Redirect::new();
    redirect.stdout = open_for_write(&path).unwrap();

    run_sync(&["printf", "foo"], &mut redirect, true).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "foo");
}

#[test]
fn input_from_file() {
    let tmpdir = TempDir::new().unwrap();
    let in_path = tmpdir.path().join("input");
    let out_path = tmpdir.path().join("output");
    fs::write(&in_path, "foo").unwrap();

    let mut redirect = Redirect::new();
    redirect.stdin = open_for_read(&in_path).unwrap();
    redirect.stdout = open_for_write(&out_path).unwrap();

    run_sync(&["cat"], &mut redirect, true).unwrap();
    assert_eq!(fs::read_to_string(&out_path).unwrap(), "foo");
}

#[test]
fn pipe_feeds_child_stdin_after_spawn() {
    let tmpdir = TempDir::new().unwrap();
    let out_path = tmpdir.path().join("output");

    let (read_end, mut write_end) = create_pipe().unwrap();
    let mut redirect = Redirect::new();
    redirect.stdin = read_end;
    redirect.stdout = open_for_write(&out_path).unwrap();

    let handle = spawn(&["cat"], &mut redirect, true).unwrap();

    // written only after the child is running; closing delivers EOF
    let mut writer = write_end.take_file().unwrap();
    writer.write_all(b"pipe bytes").unwrap();
    drop(writer);

    wait(handle).unwrap();
    assert_eq!(fs::read_to_string(&out_path).unwrap(), "pipe bytes");
}

#[test]
fn pipe_reads_child_stdout() {
    let (mut read_end, write_end) = create_pipe().unwrap();
    let mut redirect = Redirect::new();
    redirect.stdout = write_end;

    // reset=true closes the parent's copy of the write end, which is what
    // lets the read below see EOF
    let handle = spawn(&["printf", "foo"], &mut redirect, true).unwrap();
    let output = std::io::read_to_string(read_end.take_file().unwrap()).unwrap();
    wait(handle).unwrap();
    assert_eq!(output, "foo");
}

#[test]
fn pipeline_of_two_children() {
    let tmpdir = TempDir::new().unwrap();
    let out_path = tmpdir.path().join("count");

    let (read_end, write_end) = create_pipe().unwrap();

    let mut first = Redirect::new();
    first.stdout = write_end;
    let h1 = spawn(&["printf", "foo\\nbar\\nbaz\\n"], &mut first, true).unwrap();

    let mut second = Redirect::new();
    second.stdin = read_end;
    second.stdout = open_for_write(&out_path).unwrap();
    let h2 = spawn(&["wc", "-l"], &mut second, true).unwrap();

    wait_all([h1, h2]).unwrap();
    assert_eq!(fs::read_to_string(&out_path).unwrap().trim(), "3");
}

#[test]
fn stderr_to_file() {
    let tmpdir = TempDir::new().unwrap();
    let path = tmpdir.path().join("errors");
    let mut redirect = Redirect::new();
    redirect.stderr = open_for_write(&path).unwrap();

    run_sync(&["sh", "-c", "printf oops >&2"], &mut redirect, true).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "oops");
}

#[test]
fn spawn_does_not_wait() {
    let mut redirect = Redirect::new();
    let start = Instant::now();
    let handle = spawn(&["sleep", "10"], &mut redirect, true).unwrap();
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "spawn blocked until child exit"
    );
    assert!(handle.is_valid());
    drop(handle);
}
