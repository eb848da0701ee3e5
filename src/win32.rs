#![allow(non_snake_case)]

use std::fs::File;
use std::io::{Error, Result};
use std::iter;
use std::mem;
use std::os::windows::io::{AsRawHandle, FromRawHandle, RawHandle};
use std::ptr;

use winapi::shared::minwindef::{BOOL, DWORD};
use winapi::um::handleapi;
use winapi::um::minwinbase::SECURITY_ATTRIBUTES;
use winapi::um::namedpipeapi;
use winapi::um::processenv;
use winapi::um::processthreadsapi;
use winapi::um::processthreadsapi::{PROCESS_INFORMATION, STARTUPINFOW};
use winapi::um::synchapi;
use winapi::um::winbase::{
    FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS, FormatMessageW, INFINITE,
    STD_ERROR_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE, WAIT_FAILED, WAIT_OBJECT_0,
};

pub use winapi::shared::winerror::ERROR_BAD_PATHNAME;
pub use winapi::um::winbase::{HANDLE_FLAG_INHERIT, STARTF_USESTDHANDLES};

/// Owned process handle; closed exactly once, on drop.
#[derive(Debug)]
pub struct Handle(RawHandle);

impl Drop for Handle {
    fn drop(&mut self) {
        unsafe {
            handleapi::CloseHandle(self.0 as _);
        }
    }
}

impl AsRawHandle for Handle {
    fn as_raw_handle(&self) -> RawHandle {
        self.0
    }
}

// A process handle is just a kernel object reference; no thread affinity.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

fn check(status: BOOL) -> Result<()> {
    if status != 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

// UTF-16, zero-terminated.
fn to_nullterm(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(iter::once(0u16)).collect()
}

pub fn CreatePipe(inherit_handle: bool) -> Result<(File, File)> {
    let mut attributes = SECURITY_ATTRIBUTES {
        nLength: mem::size_of::<SECURITY_ATTRIBUTES>() as DWORD,
        lpSecurityDescriptor: ptr::null_mut(),
        bInheritHandle: inherit_handle as BOOL,
    };
    let (mut r, mut w) = (ptr::null_mut(), ptr::null_mut());
    check(unsafe { namedpipeapi::CreatePipe(&mut r, &mut w, &mut attributes, 0) })?;
    Ok(unsafe { (File::from_raw_handle(r as _), File::from_raw_handle(w as _)) })
}

pub fn SetHandleInformation(handle: &File, dwMask: u32, dwFlags: u32) -> Result<()> {
    check(unsafe { handleapi::SetHandleInformation(handle.as_raw_handle() as _, dwMask, dwFlags) })
}

/// The parent's own standard handle, unowned; used to fill `STARTUPINFOW`
/// slots the caller left to inherit.
pub fn GetStdHandle(which: StandardStream) -> RawHandle {
    let id = match which {
        StandardStream::Input => STD_INPUT_HANDLE,
        StandardStream::Output => STD_OUTPUT_HANDLE,
        StandardStream::Error => STD_ERROR_HANDLE,
    };
    unsafe { processenv::GetStdHandle(id) as RawHandle }
}

#[derive(Debug, Copy, Clone)]
pub enum StandardStream {
    Input,
    Output,
    Error,
}

pub fn CreateProcess(
    cmdline: &str,
    stdin: RawHandle,
    stdout: RawHandle,
    stderr: RawHandle,
    inherit_handles: bool,
    sinfo_flags: u32,
) -> Result<Handle> {
    let mut sinfo: STARTUPINFOW = unsafe { mem::zeroed() };
    sinfo.cb = mem::size_of::<STARTUPINFOW>() as DWORD;
    sinfo.dwFlags = sinfo_flags;
    sinfo.hStdInput = stdin as _;
    sinfo.hStdOutput = stdout as _;
    sinfo.hStdError = stderr as _;
    let mut pinfo: PROCESS_INFORMATION = unsafe { mem::zeroed() };
    let mut cmdline = to_nullterm(cmdline);
    check(unsafe {
        processthreadsapi::CreateProcessW(
            ptr::null(),
            cmdline.as_mut_ptr(),
            ptr::null_mut(), // lpProcessAttributes
            ptr::null_mut(), // lpThreadAttributes
            inherit_handles as BOOL,
            0,               // dwCreationFlags
            ptr::null_mut(), // lpEnvironment
            ptr::null(),     // lpCurrentDirectory
            &mut sinfo,
            &mut pinfo,
        )
    })?;
    unsafe {
        handleapi::CloseHandle(pinfo.hThread);
    }
    Ok(Handle(pinfo.hProcess as RawHandle))
}

/// Block until the process terminates.
pub fn WaitForSingleObject(handle: &Handle) -> Result<()> {
    let result = unsafe { synchapi::WaitForSingleObject(handle.0 as _, INFINITE) };
    match result {
        WAIT_OBJECT_0 => Ok(()),
        WAIT_FAILED => Err(Error::last_os_error()),
        other => panic!("WaitForSingleObject returned {}", other),
    }
}

pub fn GetExitCodeProcess(handle: &Handle) -> Result<u32> {
    let mut exit_code = 0u32;
    check(unsafe { processthreadsapi::GetExitCodeProcess(handle.0 as _, &mut exit_code) })?;
    Ok(exit_code)
}

/// Win32 error code to a trimmed, human-readable message; never fails.
pub fn error_string(code: i32) -> String {
    let mut buf = [0u16; 2048];
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            ptr::null(),
            code as DWORD,
            0, // default language
            buf.as_mut_ptr(),
            buf.len() as DWORD,
            ptr::null_mut(),
        )
    };
    if len == 0 {
        return format!("unknown error {}", code);
    }
    let mut len = len as usize;
    while len > 0 && char::from_u32(buf[len - 1] as u32).is_some_and(char::is_whitespace) {
        len -= 1;
    }
    String::from_utf16_lossy(&buf[..len])
}
