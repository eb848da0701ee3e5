use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::error::{Error, os_message};

/// An owned OS stream resource - an open file or one end of a pipe - or the
/// invalid sentinel.
///
/// An invalid endpoint stands for "inherit the caller's corresponding stream"
/// when placed in a [`Redirect`]. Valid endpoints own their descriptor/handle:
/// dropping one closes it, [`reset`](Endpoint::reset) closes it and leaves the
/// sentinel behind, and both are no-ops on an already-invalid endpoint, so a
/// double close cannot happen.
///
/// Endpoints are created non-inheritable at the OS level (close-on-exec on
/// Unix, a non-inheriting handle on Windows); [`spawn`](crate::spawn) grants
/// the child access only through the duplication it performs itself.
#[derive(Debug, Default)]
pub struct Endpoint {
    file: Option<File>,
}

impl Endpoint {
    /// Returns the invalid endpoint.
    pub fn invalid() -> Endpoint {
        Endpoint { file: None }
    }

    /// True if this endpoint holds an open resource.
    pub fn is_valid(&self) -> bool {
        self.file.is_some()
    }

    /// Closes the endpoint and resets it to invalid. No-op when already
    /// invalid.
    pub fn reset(&mut self) {
        self.file.take();
    }

    /// Closes the endpoint. No-op when invalid.
    pub fn close(self) {}

    /// Takes the underlying file out, leaving the endpoint invalid.
    ///
    /// This is how a caller writes to a pipe's write end (or reads from a read
    /// end) it kept out of a [`Redirect`]; dropping the returned `File` closes
    /// the stream, which is what delivers EOF to a child reading the other
    /// end.
    pub fn take_file(&mut self) -> Option<File> {
        self.file.take()
    }

    pub(crate) fn as_file(&self) -> Option<&File> {
        self.file.as_ref()
    }
}

impl From<File> for Endpoint {
    fn from(file: File) -> Endpoint {
        Endpoint { file: Some(file) }
    }
}

/// The three endpoints a spawned child's standard streams are wired to.
///
/// Each field independently defaults to the invalid endpoint, meaning the
/// child inherits the parent's corresponding stream. By default
/// [`spawn`](crate::spawn) destructively resets the whole `Redirect` after the
/// spawn attempt; callers that reuse endpoints across several spawns pass
/// `reset = false` and close them on their own.
#[derive(Debug, Default)]
pub struct Redirect {
    pub stdin: Endpoint,
    pub stdout: Endpoint,
    pub stderr: Endpoint,
}

impl Redirect {
    /// A redirect that inherits all three standard streams.
    pub fn new() -> Redirect {
        Redirect::default()
    }

    /// Closes and invalidates all three endpoints. Idempotent.
    pub fn reset(&mut self) {
        self.stdin.reset();
        self.stdout.reset();
        self.stderr.reset();
    }

    #[cfg(windows)]
    pub(crate) fn any_valid(&self) -> bool {
        self.stdin.is_valid() || self.stdout.is_valid() || self.stderr.is_valid()
    }
}

/// Opens `path` for reading, as an endpoint for a child's stdin.
///
/// An empty path is rejected without touching the OS.
pub fn open_for_read<P: AsRef<Path>>(path: P) -> Result<Endpoint, Error> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::OpenFailure("filename cannot be empty".to_string()));
    }
    match File::open(path) {
        Ok(file) => Ok(Endpoint::from(file)),
        Err(err) => Err(Error::OpenFailure(format!(
            "could not open file '{}' for reading: {}",
            path.display(),
            os_message(&err)
        ))),
    }
}

/// Opens `path` for writing, as an endpoint for a child's stdout or stderr.
///
/// The file is created if missing and truncated if present. An empty path is
/// rejected without touching the OS.
pub fn open_for_write<P: AsRef<Path>>(path: P) -> Result<Endpoint, Error> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::OpenFailure("filename cannot be empty".to_string()));
    }
    match OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
    {
        Ok(file) => Ok(Endpoint::from(file)),
        Err(err) => Err(Error::OpenFailure(format!(
            "could not open file '{}' for writing: {}",
            path.display(),
            os_message(&err)
        ))),
    }
}

/// Creates an anonymous pipe, returned as `(read_end, write_end)`.
///
/// Both ends are non-inheritable until a spawn transiently duplicates one
/// into a child. On failure neither end is returned, so a half-open pipe
/// cannot escape.
pub fn create_pipe() -> Result<(Endpoint, Endpoint), Error> {
    let (read_end, write_end) = sys_pipe()
        .map_err(|err| Error::PipeFailure(format!("could not create pipe: {}", os_message(&err))))?;
    Ok((Endpoint::from(read_end), Endpoint::from(write_end)))
}

#[cfg(unix)]
fn sys_pipe() -> io::Result<(File, File)> {
    crate::posix::pipe()
}

#[cfg(windows)]
fn sys_pipe() -> io::Result<(File, File)> {
    crate::win32::CreatePipe(false)
}
