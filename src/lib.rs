//! Portable execution of child processes.
//!
//! This crate is a thin, synchronous layer over the two process-creation
//! contracts of the supported platforms: Unix, where a child is started from a
//! pre-split argument array with no shell involved, and Windows, where
//! `CreateProcessW` accepts a single command-line string that the child's
//! runtime re-splits. The crate guarantees that the child observes exactly the
//! caller's argument vector on both - on Windows via a quoting/escaping
//! transform that inverts the runtime's own splitting rule (see [`cmdline`]).
//!
//! A child's standard streams can be wired to files or pipes through a
//! [`Redirect`], whose endpoints are owned [`Endpoint`] values created with
//! [`open_for_read`], [`open_for_write`] and [`create_pipe`].
//!
//! # Examples
//!
//! Run a command to completion, inheriting all three standard streams:
//!
//! ```no_run
//! # fn main() -> Result<(), childproc::Error> {
//! let mut redirect = childproc::Redirect::new();
//! childproc::run_sync(&["touch", "/tmp/marker"], &mut redirect, true)?;
//! # Ok(())
//! # }
//! ```
//!
//! Capture output in a file, feed input through a pipe:
//!
//! ```no_run
//! use std::io::Write;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (read_end, mut write_end) = childproc::create_pipe()?;
//! let mut redirect = childproc::Redirect::new();
//! redirect.stdin = read_end;
//! redirect.stdout = childproc::open_for_write("/tmp/sorted")?;
//!
//! let handle = childproc::spawn(&["sort"], &mut redirect, true)?;
//! let mut input = write_end.take_file().unwrap();
//! input.write_all(b"b\nc\na\n")?;
//! drop(input); // EOF for the child
//! childproc::wait(handle)?;
//! # Ok(())
//! # }
//! ```
//!
//! The layer holds no state of its own: handles and endpoints are owned by the
//! caller, no threads are spawned, and no locking is performed. Several
//! children may be spawned before any is waited on, which allows pipeline-style
//! composition by wiring one child's output endpoint as another's input.

pub mod cmdline;
mod endpoint;
mod error;
mod spawn;

#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod win32;

#[cfg(test)]
mod tests;

pub use endpoint::{Endpoint, Redirect, create_pipe, open_for_read, open_for_write};
pub use error::{Error, WaitError};
pub use spawn::{Handle, run_sync, spawn, wait, wait_all};
