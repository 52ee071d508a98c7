
mod huge;

use std::io::{Error, ErrorKind, Result};
use std::os::fd::{AsFd, AsRawFd};

pub use huge::*;

use crate::ffi::syscall::write;

/// Writes the whole buffer to `fd`, retrying partial writes and `EINTR`.
///
/// Performs no allocation on success, so it is safe to call between
/// `fork` and `exec`.
pub fn write_all(fd: impl AsFd, mut buf: &[u8]) -> Result<()> {
    let fd = fd.as_fd().as_raw_fd();
    while !buf.is_empty() {
        match write(fd, buf) {
            Ok(0) => return Err(Error::from(ErrorKind::WriteZero)),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => (),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
