use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::{Error, Result};
use std::iter;
use std::mem;
use std::os::unix::io::FromRawFd;
use std::ptr;

fn check_err<T: Ord + Default>(num: T) -> Result<T> {
    if num < T::default() {
        return Err(Error::last_os_error());
    }
    Ok(num)
}

/// Create a pipe with both ends close-on-exec.
#[cfg(not(target_os = "macos"))]
pub fn pipe() -> Result<(File, File)> {
    let mut fds = [0 as libc::c_int; 2];
    check_err(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) })?;
    Ok(unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) })
}

// macOS has no pipe2; set the flags after the fact. The Files own the fds, so
// a failing fcntl closes both ends on the way out.
#[cfg(target_os = "macos")]
pub fn pipe() -> Result<(File, File)> {
    let mut fds = [0 as libc::c_int; 2];
    check_err(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    let ends = unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) };
    set_cloexec(fds[0], true)?;
    set_cloexec(fds[1], true)?;
    Ok(ends)
}

pub fn fork() -> Result<u32> {
    check_err(unsafe { libc::fork() }).map(|pid| pid as u32)
}

fn str_to_cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::from_raw_os_error(libc::EINVAL))
}

fn cstring_ptr(s: &CString) -> *const libc::c_char {
    s.as_bytes_with_nul().as_ptr() as _
}

/// Null-terminated argument array for `execvp`.
///
/// Built before `fork` so the child does not allocate between `fork` and
/// `exec`.
#[derive(Debug)]
pub struct CVec {
    // Individual C strings; not unused as rustc thinks, they are pointed to
    // by elements of self.ptrs.
    #[allow(dead_code)]
    strings: Vec<CString>,

    // nullptr-terminated vector of pointers into self.strings.
    ptrs: Vec<*const libc::c_char>,
}

impl CVec {
    pub fn new<S: AsRef<str>>(slice: &[S]) -> Result<CVec> {
        let strings = slice
            .iter()
            .map(|s| str_to_cstring(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let ptrs: Vec<_> = strings
            .iter()
            .map(cstring_ptr)
            .chain(iter::once(ptr::null()))
            .collect();
        Ok(CVec { strings, ptrs })
    }

    fn as_c_vec(&self) -> *const *const libc::c_char {
        self.ptrs.as_ptr()
    }
}

/// Replace the current process image; argument 0 doubles as the program
/// searched in `PATH`. Only ever returns an error.
pub fn execvp(argv: &CVec) -> Result<()> {
    check_err(unsafe { libc::execvp(argv.ptrs[0], argv.as_c_vec()) })?;
    unreachable!();
}

pub fn _exit(status: u8) -> ! {
    unsafe { libc::_exit(status as libc::c_int) }
}

/// Decoded `waitpid` status.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WaitStatus {
    Exited(u32),
    Signaled(i32),
    /// Neither a normal exit nor a signal (e.g. a stop); callers keep
    /// waiting.
    Other(i32),
}

pub fn waitpid(pid: u32, flags: i32) -> Result<(u32, WaitStatus)> {
    let mut status = 0 as libc::c_int;
    let pid = check_err(unsafe {
        libc::waitpid(
            pid as libc::pid_t,
            &mut status as *mut libc::c_int,
            flags as libc::c_int,
        )
    })?;
    Ok((pid as u32, decode_wait_status(status)))
}

fn decode_wait_status(status: i32) -> WaitStatus {
    if libc::WIFEXITED(status) {
        WaitStatus::Exited(libc::WEXITSTATUS(status) as u32)
    } else if libc::WIFSIGNALED(status) {
        WaitStatus::Signaled(libc::WTERMSIG(status))
    } else {
        WaitStatus::Other(status)
    }
}

pub fn dup2(oldfd: i32, newfd: i32) -> Result<()> {
    check_err(unsafe { libc::dup2(oldfd, newfd) })?;
    Ok(())
}

pub fn close(fd: i32) -> Result<()> {
    check_err(unsafe { libc::close(fd) })?;
    Ok(())
}

fn fcntl(fd: i32, cmd: i32, arg1: Option<i32>) -> Result<i32> {
    check_err(unsafe {
        match arg1 {
            Some(arg1) => libc::fcntl(fd, cmd, arg1),
            None => libc::fcntl(fd, cmd),
        }
    })
}

pub fn set_cloexec(fd: i32, cloexec: bool) -> Result<()> {
    let old = fcntl(fd, libc::F_GETFD, None)?;
    let new = if cloexec {
        old | libc::FD_CLOEXEC
    } else {
        old & !libc::FD_CLOEXEC
    };
    fcntl(fd, libc::F_SETFD, Some(new))?;
    Ok(())
}

pub fn reset_sigpipe() -> Result<()> {
    // Called in the child before exec to restore the SIGPIPE handling that
    // Unix programs expect. Quoting std::process::Command::do_exec:
    //
    // """
    // libstd ignores SIGPIPE, and signal-handling libraries often set a
    // mask. Child processes inherit ignored signals and the signal mask from
    // their parent, but most UNIX programs do not reset these things on
    // their own, so we need to clean things up now to avoid confusing the
    // program we're about to run.
    // """

    unsafe {
        let mut set = mem::MaybeUninit::<libc::sigset_t>::uninit();
        check_err(libc::sigemptyset(set.as_mut_ptr()))?;
        check_err(libc::pthread_sigmask(
            libc::SIG_SETMASK,
            set.as_ptr(),
            ptr::null_mut(),
        ))?;
        if libc::signal(libc::SIGPIPE, libc::SIG_DFL) == libc::SIG_ERR {
            return Err(Error::last_os_error());
        }
    }
    Ok(())
}

/// `errno` to a human-readable message via `strerror_r`; never fails.
pub fn error_string(errno: i32) -> String {
    let mut buf = [0 as libc::c_char; 256];
    let rc = unsafe { libc::strerror_r(errno, buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return format!("unknown error {}", errno);
    }
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}
