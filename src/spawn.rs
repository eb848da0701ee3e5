use crate::endpoint::Redirect;
use crate::error::Error;

/// Opaque handle to a spawned child process.
///
/// A handle is produced by [`spawn`] and retired by [`wait`], which takes it
/// by value - the underlying OS identifier is waited on at most once by
/// construction. On Windows the handle owns the process `HANDLE` and releases
/// it when the `Handle` is dropped or waited on; on Unix the pid needs no
/// release. Dropping a handle without waiting does not block (on Unix the
/// child then stays un-reaped until the process exits).
#[derive(Debug)]
pub struct Handle(Option<os::RawProc>);

impl Handle {
    /// The "no process" sentinel. Waiting on it fails with
    /// [`Error::InvalidHandle`] without blocking.
    pub fn invalid() -> Handle {
        Handle(None)
    }

    /// True unless this is the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }
}

/// Starts a child process running `args`, with its standard streams wired
/// per `redirect`.
///
/// Returns as soon as the OS has accepted process creation; it never waits
/// for the child. The child observes exactly `args` as its argument vector,
/// with `args[0]` the program name looked up along `PATH`.
///
/// When `reset` is true (the conventional default), every valid endpoint in
/// `redirect` is closed and reset to invalid before this returns - on the
/// failure paths too, so descriptors cannot leak. Callers that reuse
/// endpoints across spawns pass `false` and manage closing themselves.
///
/// Fails with [`Error::EmptyCommand`] for an empty `args` (no OS call is
/// made) and [`Error::SpawnFailure`] when the OS refuses to create the
/// process; the message embeds the OS's own error text.
pub fn spawn<S: AsRef<str>>(
    args: &[S],
    redirect: &mut Redirect,
    reset: bool,
) -> Result<Handle, Error> {
    let result = if args.is_empty() {
        Err(Error::EmptyCommand)
    } else {
        os::spawn_child(args, redirect)
    };
    if reset {
        redirect.reset();
    }
    result
}

/// Spawns `args` and waits for it to finish: [`spawn`] composed with
/// [`wait`], surfacing whichever fails first.
pub fn run_sync<S: AsRef<str>>(
    args: &[S],
    redirect: &mut Redirect,
    reset: bool,
) -> Result<(), Error> {
    let handle = spawn(args, redirect, reset)?;
    wait(handle)
}

/// Blocks until the child behind `handle` terminates and normalizes the
/// result.
///
/// Exit code 0 maps to `Ok(())`; any other termination is an
/// [`Error::WaitFailure`] distinguishing a non-zero exit code, termination by
/// signal (or the platform's abnormal-termination equivalent), and failure of
/// the OS wait call itself. The invalid sentinel fails with
/// [`Error::InvalidHandle`] without blocking.
pub fn wait(handle: Handle) -> Result<(), Error> {
    match handle.0 {
        None => Err(Error::InvalidHandle),
        Some(child) => os::wait_child(child),
    }
}

/// Waits on each handle in order, short-circuiting on the first failure.
///
/// The remaining handles are not waited on; they are dropped, which releases
/// any OS resources without blocking.
///
/// Known limitation: the waits are strictly sequential, so if an earlier
/// child blocks writing to a pipe whose reader is a *later* handle in the
/// sequence, this call deadlocks. Callers wiring pipelines must drain pipes
/// themselves or order the handles by expected completion.
pub fn wait_all<I>(handles: I) -> Result<(), Error>
where
    I: IntoIterator<Item = Handle>,
{
    for handle in handles {
        wait(handle)?;
    }
    Ok(())
}

fn spawn_failure(command: &str, message: &str) -> Error {
    Error::SpawnFailure(format!("could not spawn '{}': {}", command, message))
}

#[cfg(unix)]
mod os {
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::os::unix::io::AsRawFd;

    use crate::endpoint::Redirect;
    use crate::error::{Error, WaitError, os_message};
    use crate::posix;

    use super::{Handle, spawn_failure};

    pub(super) type RawProc = u32;

    pub(super) fn spawn_child<S: AsRef<str>>(
        args: &[S],
        redirect: &Redirect,
    ) -> Result<Handle, Error> {
        let command = args[0].as_ref();
        // Built up front: the child must not allocate between fork and exec,
        // and an interior NUL should fail before any process exists.
        let argv =
            posix::CVec::new(args).map_err(|e| spawn_failure(command, &os_message(&e)))?;

        let mut exec_fail_pipe =
            posix::pipe().map_err(|e| spawn_failure(command, &os_message(&e)))?;

        let child_pid = posix::fork().map_err(|e| spawn_failure(command, &os_message(&e)))?;
        if child_pid == 0 {
            drop(exec_fail_pipe.0);
            let result = do_exec(&argv, redirect);
            // Only reached when exec failed; tell the parent why and bail.
            let error_code = match result {
                Ok(()) => unreachable!(),
                Err(e) => e.raw_os_error().unwrap_or(-1),
            } as u32;
            exec_fail_pipe.1.write_all(&error_code.to_le_bytes()).ok();
            posix::_exit(127);
        }

        // The write end survives only in the child; EOF without payload means
        // exec succeeded (the descriptor is close-on-exec).
        drop(exec_fail_pipe.1);
        match read_exact_or_eof::<4>(&mut exec_fail_pipe.0) {
            Ok(None) => Ok(Handle(Some(child_pid))),
            Ok(Some(buf)) => {
                let error_code = u32::from_le_bytes(buf) as i32;
                // The child already exited; reap it so no zombie outlives the
                // failed spawn.
                posix::waitpid(child_pid, 0).ok();
                Err(spawn_failure(command, &posix::error_string(error_code)))
            }
            Err(e) => Err(spawn_failure(command, &os_message(&e))),
        }
    }

    fn do_exec(argv: &posix::CVec, redirect: &Redirect) -> io::Result<()> {
        wire_stream(redirect.stdin.as_file(), 0)?;
        wire_stream(redirect.stdout.as_file(), 1)?;
        wire_stream(redirect.stderr.as_file(), 2)?;
        posix::reset_sigpipe()?;
        posix::execvp(argv)?;
        unreachable!();
    }

    // Land the endpoint on its standard descriptor with exactly one copy
    // surviving exec. dup2 leaves the duplicate without close-on-exec; an
    // endpoint already sitting on the target descriptor keeps its flag
    // cleared instead.
    fn wire_stream(end: Option<&File>, target_fd: i32) -> io::Result<()> {
        let Some(file) = end else {
            return Ok(());
        };
        let fd = file.as_raw_fd();
        if fd == target_fd {
            posix::set_cloexec(fd, false)?;
        } else {
            posix::dup2(fd, target_fd)?;
            posix::close(fd)?;
        }
        Ok(())
    }

    /// Read exactly N bytes, or return None on immediate EOF. Similar to
    /// read_exact(), but distinguishes between no read and partial read
    /// (which is treated as error).
    fn read_exact_or_eof<const N: usize>(source: &mut File) -> io::Result<Option<[u8; N]>> {
        let mut buf = [0u8; N];
        let mut total_read = 0;
        while total_read < N {
            let n = source.read(&mut buf[total_read..])?;
            if n == 0 {
                break;
            }
            total_read += n;
        }
        match total_read {
            0 => Ok(None),
            n if n == N => Ok(Some(buf)),
            _ => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }

    pub(super) fn wait_child(pid: RawProc) -> Result<(), Error> {
        loop {
            let (_, status) = posix::waitpid(pid, 0)
                .map_err(|e| Error::WaitFailure(WaitError::Os(os_message(&e))))?;
            match status {
                posix::WaitStatus::Exited(0) => return Ok(()),
                posix::WaitStatus::Exited(code) => {
                    return Err(Error::WaitFailure(WaitError::NonZeroExit(code)));
                }
                posix::WaitStatus::Signaled(signal) => {
                    return Err(Error::WaitFailure(WaitError::Abnormal(signal)));
                }
                posix::WaitStatus::Other(_) => continue,
            }
        }
    }
}

#[cfg(windows)]
mod os {
    use std::io;
    use std::os::windows::io::{AsRawHandle, RawHandle};
    use std::ptr;

    use crate::cmdline;
    use crate::endpoint::{Endpoint, Redirect};
    use crate::error::{Error, WaitError, os_message};
    use crate::win32;

    use super::{Handle, spawn_failure};

    pub(super) type RawProc = win32::Handle;

    pub(super) fn spawn_child<S: AsRef<str>>(
        args: &[S],
        redirect: &Redirect,
    ) -> Result<Handle, Error> {
        let command = args[0].as_ref();
        // A NUL would silently truncate the command line handed to the OS.
        if args.iter().any(|arg| arg.as_ref().contains('\0')) {
            let message = win32::error_string(win32::ERROR_BAD_PATHNAME as i32);
            return Err(spawn_failure(command, &message));
        }
        let cmdline = cmdline::build_cmdline(args);
        if cmdline.is_empty() {
            return Err(Error::EmptyCommand);
        }

        // The caller's endpoints are inheritable only across CreateProcess.
        set_inheritable(redirect, true).map_err(|e| spawn_failure(command, &os_message(&e)))?;
        let result = create(&cmdline, redirect);
        let _ = set_inheritable(redirect, false);

        match result {
            Ok(handle) => Ok(Handle(Some(handle))),
            Err(e) => Err(spawn_failure(command, &os_message(&e))),
        }
    }

    fn create(cmdline: &str, redirect: &Redirect) -> io::Result<win32::Handle> {
        let (sinfo_flags, stdin, stdout, stderr) = if redirect.any_valid() {
            (
                win32::STARTF_USESTDHANDLES,
                child_handle(&redirect.stdin, win32::StandardStream::Input),
                child_handle(&redirect.stdout, win32::StandardStream::Output),
                child_handle(&redirect.stderr, win32::StandardStream::Error),
            )
        } else {
            (0, ptr::null_mut(), ptr::null_mut(), ptr::null_mut())
        };
        win32::CreateProcess(cmdline, stdin, stdout, stderr, true, sinfo_flags)
    }

    fn child_handle(end: &Endpoint, stream: win32::StandardStream) -> RawHandle {
        match end.as_file() {
            Some(file) => file.as_raw_handle(),
            None => win32::GetStdHandle(stream),
        }
    }

    fn set_inheritable(redirect: &Redirect, inheritable: bool) -> io::Result<()> {
        let flags = if inheritable {
            win32::HANDLE_FLAG_INHERIT
        } else {
            0
        };
        for end in [&redirect.stdin, &redirect.stdout, &redirect.stderr] {
            if let Some(file) = end.as_file() {
                win32::SetHandleInformation(file, win32::HANDLE_FLAG_INHERIT, flags)?;
            }
        }
        Ok(())
    }

    pub(super) fn wait_child(handle: RawProc) -> Result<(), Error> {
        win32::WaitForSingleObject(&handle)
            .map_err(|e| Error::WaitFailure(WaitError::Os(os_message(&e))))?;
        let status = win32::GetExitCodeProcess(&handle)
            .map_err(|e| Error::WaitFailure(WaitError::Os(os_message(&e))))?;
        drop(handle);
        match status {
            0 => Ok(()),
            // NTSTATUS severity-error codes mark crashes and terminations
            // rather than voluntary exits.
            status if status >= 0xC000_0000 => {
                Err(Error::WaitFailure(WaitError::Abnormal(status as i32)))
            }
            code => Err(Error::WaitFailure(WaitError::NonZeroExit(code))),
        }
    }
}
