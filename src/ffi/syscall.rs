use std::ffi::{c_char, c_int, c_uint, CStr};
use std::fs::File;
use std::io::{Error, Result};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd};

use super::Attr;

pub fn perf_event_open(attr: &Attr, pid: i32, cpu: i32, group_fd: i32, flags: u64) -> Result<File> {
    let num = libc::SYS_perf_event_open;
    let fd = unsafe { libc::syscall(num, attr as *const Attr, pid, cpu, group_fd, flags) };
    if fd != -1 {
        Ok(unsafe { File::from_raw_fd(fd as _) })
    } else {
        Err(Error::last_os_error())
    }
}

/// Signature of the `perf_event_open_sys::ioctls` wrappers taking a plain integer.
pub type IocOp = unsafe fn(c_int, c_uint) -> c_int;

pub fn ioctl(file: &File, op: IocOp, arg: u32) -> Result<i32> {
    let fd = file.as_raw_fd();
    let result = unsafe { op(fd, arg) };
    if result != -1 {
        Ok(result)
    } else {
        Err(Error::last_os_error())
    }
}

pub fn read(file: &File, buf: &mut [u8]) -> Result<usize> {
    let fd = file.as_raw_fd();
    let count = buf.len();
    let buf = buf.as_mut_ptr() as _;
    let bytes = unsafe { libc::read(fd, buf, count) };
    if bytes != -1 {
        Ok(bytes as _)
    } else {
        Err(Error::last_os_error())
    }
}

pub fn write(fd: c_int, buf: &[u8]) -> Result<usize> {
    let count = buf.len();
    let buf = buf.as_ptr() as _;
    let bytes = unsafe { libc::write(fd, buf, count) };
    if bytes != -1 {
        Ok(bytes as _)
    } else {
        Err(Error::last_os_error())
    }
}

// Unlike dropping the `File`, this reports the `close` result.
pub fn close(file: File) -> Result<()> {
    let fd = file.into_raw_fd();
    let result = unsafe { libc::close(fd) };
    if result != -1 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

/// Returns `(read end, write end)`, both close-on-exec.
pub fn pipe() -> Result<(File, File)> {
    let mut fds = [-1; 2];
    let result = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if result != -1 {
        let rx = unsafe { File::from_raw_fd(fds[0]) };
        let tx = unsafe { File::from_raw_fd(fds[1]) };
        Ok((rx, tx))
    } else {
        Err(Error::last_os_error())
    }
}

pub unsafe fn fork() -> Result<i32> {
    let pid = libc::fork();
    if pid != -1 {
        Ok(pid)
    } else {
        Err(Error::last_os_error())
    }
}

/// Only returns if the program image could not be replaced.
pub unsafe fn execvp(file: &CStr, argv: &[*const c_char]) -> Error {
    libc::execvp(file.as_ptr(), argv.as_ptr());
    Error::last_os_error()
}

pub fn kill(pid: i32, sig: c_int) -> Result<()> {
    let result = unsafe { libc::kill(pid, sig) };
    if result != -1 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

/// Blocks until `pid` changes state, retrying on `EINTR`. Returns the raw wait status.
pub fn waitpid(pid: i32, options: c_int) -> Result<(i32, c_int)> {
    loop {
        let mut status = 0;
        let result = unsafe { libc::waitpid(pid, &mut status, options) };
        if result != -1 {
            return Ok((result, status));
        }
        let e = Error::last_os_error();
        if e.raw_os_error() != Some(libc::EINTR) {
            return Err(e);
        }
    }
}

pub unsafe fn mmap_anon<T>(len: usize, flags: i32) -> Result<*mut T> {
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let flags = flags | libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
    let ptr = libc::mmap(std::ptr::null_mut(), len, prot, flags, -1, 0);
    if ptr != libc::MAP_FAILED {
        Ok(ptr as _)
    } else {
        Err(Error::last_os_error())
    }
}

pub unsafe fn madvise<T>(ptr: *mut T, len: usize, advice: c_int) -> Result<()> {
    let result = libc::madvise(ptr as _, len, advice);
    if result != -1 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub unsafe fn munmap<T>(ptr: *mut T, len: usize) -> Result<()> {
    let result = libc::munmap(ptr as _, len);
    if result != -1 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}
