use std::error::Error as StdError;
use std::fmt;
use std::io;

#[cfg(unix)]
use crate::posix::error_string;
#[cfg(windows)]
use crate::win32::error_string;

/// Error returned by the operations of this crate.
///
/// Every OS-level failure is surfaced immediately to the caller with the
/// underlying OS message embedded in the variant; no operation retries
/// internally, and none of them abort the process.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// `spawn` was called with an empty argument vector, or the platform
    /// command representation came out empty.
    EmptyCommand,

    /// The OS refused to create the process.
    ///
    /// This includes "executable not found" and "permission denied"; the
    /// message carries the command name and the OS error text.
    SpawnFailure(String),

    /// The child did not terminate successfully, or waiting on it failed.
    WaitFailure(WaitError),

    /// `wait` was handed the invalid-handle sentinel.
    InvalidHandle,

    /// A file could not be opened for redirection.
    OpenFailure(String),

    /// Anonymous pipe creation failed.
    PipeFailure(String),
}

/// Why a [`wait`](crate::wait) did not produce a successful outcome.
#[derive(Debug, PartialEq, Eq)]
pub enum WaitError {
    /// The child exited voluntarily with a non-zero exit code.
    NonZeroExit(u32),

    /// The child was terminated by a signal (Unix) or finished with an
    /// abnormal-termination status (Windows).
    Abnormal(i32),

    /// The OS-level wait call itself failed.
    Os(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyCommand => f.write_str("no command specified"),
            Error::SpawnFailure(msg) => write!(f, "{}", msg),
            Error::WaitFailure(err) => write!(f, "{}", err),
            Error::InvalidHandle => f.write_str("invalid process handle"),
            Error::OpenFailure(msg) => write!(f, "{}", msg),
            Error::PipeFailure(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::NonZeroExit(code) => {
                write!(f, "child process exited with error code {}", code)
            }
            #[cfg(unix)]
            WaitError::Abnormal(signal) => {
                write!(f, "child process terminated by signal {}", signal)
            }
            #[cfg(windows)]
            WaitError::Abnormal(status) => {
                write!(
                    f,
                    "child process terminated abnormally with status {:#010x}",
                    *status as u32
                )
            }
            WaitError::Os(msg) => write!(f, "could not wait on child process: {}", msg),
        }
    }
}

impl StdError for Error {}

/// Render an `io::Error` through the platform's own message facility.
///
/// Errors that carry no OS code (synthetic ones) fall back to their `Display`
/// output, so the conversion itself cannot fail.
pub(crate) fn os_message(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => error_string(code),
        None => err.to_string(),
    }
}
