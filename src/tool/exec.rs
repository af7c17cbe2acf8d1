// src/tool/exec.rs

//! Child process execution for external tools
//!
//! The child inherits the caller's environment with `HOME` pointed at the
//! sandbox. stdin feeding and stdout/stderr draining run on scoped threads
//! while the parent waits, so a child that blocks on a full pipe cannot
//! deadlock against a parent still writing its input.
//!
//! On Unix the child leads its own process group. A timeout kills the whole
//! group, so background processes started by a tool script cannot hold the
//! output pipes open past the limit.

use std::ffi::OsString;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::{Error, ProcessFailure, Result};

/// Captured output of a finished tool; stderr is only logged
#[derive(Debug, Default)]
pub(crate) struct ProcessOutput {
    pub stdout: Vec<u8>,
}

/// A process to run
pub(crate) struct ProcessSpec<'a> {
    /// Human-readable command, used in logs and errors
    pub label: &'a str,
    pub argv: Vec<OsString>,
    pub home: &'a Path,
    pub stdin: Option<&'a [u8]>,
    pub timeout: Option<Duration>,
}

/// Spawn the process, exchange pipes, and wait for a successful exit
pub(crate) fn run(spec: ProcessSpec<'_>) -> Result<ProcessOutput> {
    let fail = |source: ProcessFailure| Error::Process {
        command: spec.label.to_string(),
        source,
    };

    let (program, args) = spec.argv.split_first().ok_or_else(|| {
        fail(ProcessFailure::Spawn(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty argument vector",
        )))
    })?;

    debug!("Executing: {:?} {:?}", program, args);

    let mut command = Command::new(program);
    command
        .args(args)
        .env("HOME", spec.home)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|e| fail(ProcessFailure::Spawn(e)))?;

    let stdin_pipe = child.stdin.take();
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let input = spec.stdin;
    let label = spec.label;

    let (status, stdout, stderr, fed) = thread::scope(|scope| {
        let writer = scope.spawn(move || feed(stdin_pipe, input, label));
        let out_reader = scope.spawn(move || drain(stdout_pipe));
        let err_reader = scope.spawn(move || drain(stderr_pipe));

        let status = wait(&mut child, spec.timeout);

        (
            status,
            join(out_reader.join()),
            join(err_reader.join()),
            join(writer.join()),
        )
    });

    let status = status.map_err(fail)?;
    let stdout = stdout.map_err(|e| fail(ProcessFailure::Pipe(e)))?;
    let stderr = stderr.map_err(|e| fail(ProcessFailure::Pipe(e)))?;
    log_output(label, &stdout, &stderr);

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        return Err(fail(match status.code() {
            Some(code) => ProcessFailure::Exit { code, stderr },
            None => ProcessFailure::Signaled { stderr },
        }));
    }
    fed.map_err(|e| fail(ProcessFailure::Pipe(e)))?;

    Ok(ProcessOutput { stdout })
}

/// Wait for exit, killing the child when the timeout elapses
fn wait(child: &mut Child, timeout: Option<Duration>) -> std::result::Result<ExitStatus, ProcessFailure> {
    let Some(limit) = timeout else {
        return child.wait().map_err(ProcessFailure::Wait);
    };

    match child.wait_timeout(limit).map_err(ProcessFailure::Wait)? {
        Some(status) => Ok(status),
        None => {
            // Timeout - kill the group and reap so the pipes close
            kill_group(child);
            let _ = child.wait();
            Err(ProcessFailure::TimedOut(limit))
        }
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // process_group(0) makes the child's pid its group id
    if let Ok(pid) = i32::try_from(child.id())
        && let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL)
    {
        debug!("killpg {} failed: {}", pid, e);
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

/// Write the payload and close stdin; a child that exits without reading
/// it is judged by its exit status alone
fn feed(pipe: Option<ChildStdin>, input: Option<&[u8]>, label: &str) -> io::Result<()> {
    let (Some(mut pipe), Some(input)) = (pipe, input) else {
        return Ok(());
    };
    match pipe.write_all(input) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            warn!("[{}] stdin closed before the configuration was fully written", label);
            Ok(())
        }
        result => result,
    }
}

fn drain<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer)?;
    }
    Ok(buffer)
}

fn join<T>(joined: thread::Result<io::Result<T>>) -> io::Result<T> {
    joined.unwrap_or_else(|_| Err(io::Error::other("pipe thread panicked")))
}

fn log_output(label: &str, stdout: &[u8], stderr: &[u8]) {
    for line in String::from_utf8_lossy(stdout).lines() {
        debug!("[{}] {}", label, line);
    }
    for line in String::from_utf8_lossy(stderr).lines() {
        warn!("[{}] {}", label, line);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn spec<'a>(home: &'a Path, argv: &[&str], stdin: Option<&'a [u8]>) -> ProcessSpec<'a> {
        ProcessSpec {
            label: "test",
            argv: argv.iter().map(OsString::from).collect(),
            home,
            stdin,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    #[test]
    fn test_home_is_overridden() {
        let home = TempDir::new().unwrap();
        let output = run(spec(home.path(), &["/bin/sh", "-c", "printf %s \"$HOME\""], None)).unwrap();
        assert_eq!(String::from_utf8(output.stdout).unwrap(), home.path().to_str().unwrap());
    }

    #[test]
    fn test_environment_inherited() {
        let home = TempDir::new().unwrap();
        let output = run(spec(home.path(), &["/bin/sh", "-c", "printf %s \"$PATH\""], None)).unwrap();
        assert!(!output.stdout.is_empty());
    }

    #[test]
    fn test_stdin_is_fed() {
        let home = TempDir::new().unwrap();
        let output = run(spec(home.path(), &["/bin/cat"], Some(b"payload"))).unwrap();
        assert_eq!(output.stdout, b"payload");
    }

    #[test]
    fn test_large_stdin_and_stdout_do_not_deadlock() {
        let home = TempDir::new().unwrap();
        let input = vec![b'x'; 4 * 1024 * 1024];
        let output = run(spec(home.path(), &["/bin/cat"], Some(&input))).unwrap();
        assert_eq!(output.stdout.len(), input.len());
    }

    #[test]
    fn test_nonzero_exit() {
        let home = TempDir::new().unwrap();
        let err = run(spec(home.path(), &["/bin/sh", "-c", "echo bad >&2; exit 3"], None)).unwrap_err();
        match err {
            Error::Process {
                source: ProcessFailure::Exit { code, stderr },
                ..
            } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "bad");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_spawn_failure() {
        let home = TempDir::new().unwrap();
        let err = run(spec(home.path(), &["/nonexistent/tool-binary"], None)).unwrap_err();
        assert!(matches!(
            err,
            Error::Process {
                source: ProcessFailure::Spawn(_),
                ..
            }
        ));
    }

    #[test]
    fn test_timeout_kills_child() {
        let home = TempDir::new().unwrap();
        let mut slow = spec(home.path(), &["/bin/sh", "-c", "exec sleep 10"], None);
        slow.timeout = Some(Duration::from_millis(200));
        let err = run(slow).unwrap_err();
        assert!(matches!(
            err,
            Error::Process {
                source: ProcessFailure::TimedOut(_),
                ..
            }
        ));
    }

    #[test]
    fn test_timeout_kills_grandchildren_holding_pipes() {
        let home = TempDir::new().unwrap();
        // sh forks sleep, which inherits stdout/stderr
        let mut slow = spec(home.path(), &["/bin/sh", "-c", "sleep 5; echo done"], None);
        slow.timeout = Some(Duration::from_millis(300));

        let started = Instant::now();
        let err = run(slow).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert!(matches!(
            err,
            Error::Process {
                source: ProcessFailure::TimedOut(_),
                ..
            }
        ));
    }

    #[test]
    fn test_unread_stdin_is_not_fatal() {
        let home = TempDir::new().unwrap();
        let input = vec![b'y'; 1024 * 1024];
        let output = run(spec(home.path(), &["/bin/true"], Some(&input))).unwrap();
        assert!(output.stdout.is_empty());
    }
}
