#[cfg(test)]
mod test;

use std::borrow::Borrow;
use std::fmt;
use std::fs::File;
use std::io::{self, ErrorKind, Result};
use std::os::fd::AsRawFd;

use perf_event_open_sys::ioctls;
use tracing::debug;

use crate::config::attr::from;
use crate::config::{Opts, Target};
use crate::event::Event;
use crate::ffi::syscall::{close, ioctl, perf_event_open, read, IocOp};
use crate::ffi::{bindings as b, Attr};

mod list;
mod stat;

pub use list::*;
pub use stat::*;

/// One configured counter: an attribute block, a display name and,
/// once attached, the kernel handle.
pub struct CounterDesc {
    pub(crate) attr: Attr,
    pub(crate) name: String,
    pub(crate) perf: Option<File>,
}

impl CounterDesc {
    /// Creates a detached counter seeded from `base`, or zeroed when `base` is `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use perf_ctrs::bindings::{PERF_COUNT_SW_DUMMY, PERF_TYPE_SOFTWARE};
    /// use perf_ctrs::count::CounterDesc;
    /// use perf_ctrs::Attr;
    ///
    /// let mut base = Attr::default();
    /// base.type_ = PERF_TYPE_SOFTWARE;
    /// base.config = PERF_COUNT_SW_DUMMY as _;
    ///
    /// let ctr = CounterDesc::new("dummy", Some(&base));
    /// assert_eq!(ctr.attr().type_, PERF_TYPE_SOFTWARE);
    /// assert!(!ctr.is_attached());
    /// ```
    pub fn new(name: impl Into<String>, base: Option<&Attr>) -> Self {
        Self {
            attr: base.copied().unwrap_or_default(),
            name: name.into(),
            perf: None,
        }
    }

    /// Creates a detached counter for `event` configured by `opts`.
    pub fn from_event(
        name: impl Into<String>,
        event: impl TryInto<Event, Error = io::Error>,
        opts: impl Borrow<Opts>,
    ) -> Result<Self> {
        let attr = from(event.try_into()?.0, opts.borrow())?;
        Ok(Self::new(name, Some(&attr)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self) -> &Attr {
        &self.attr
    }

    pub fn attr_mut(&mut self) -> &mut Attr {
        &mut self.attr
    }

    /// Returns the kernel handle, `None` while detached.
    pub fn file(&self) -> Option<&File> {
        self.perf.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.perf.is_some()
    }

    /// Opens the kernel counter for `target`.
    ///
    /// `group` is the handle of the group leader to join, `None` starts a new group.
    /// `flags` are `PERF_FLAG_*` bits, `PERF_FLAG_FD_CLOEXEC` is always added.
    ///
    /// On failure the counter stays detached. Attaching an attached counter
    /// fails with [`ErrorKind::AlreadyExists`] without calling into the kernel.
    pub fn attach(
        &mut self,
        target: impl Into<Target>,
        group: Option<&File>,
        flags: u64,
    ) -> Result<&File> {
        let group_fd = group.map(AsRawFd::as_raw_fd).unwrap_or(-1);
        self.attach_with(&target.into(), group_fd, flags, &mut perf_event_open)
    }

    pub(crate) fn attach_with<F>(
        &mut self,
        target: &Target,
        group_fd: i32,
        flags: u64,
        open: &mut F,
    ) -> Result<&File>
    where
        F: FnMut(&Attr, i32, i32, i32, u64) -> Result<File>,
    {
        if self.perf.is_some() {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                "counter is already attached",
            ));
        }

        let flags = flags | target.flags | b::PERF_FLAG_FD_CLOEXEC as u64;
        let perf = open(&self.attr, target.pid, target.cpu, group_fd, flags)?;
        debug!(
            name = %self.name,
            fd = perf.as_raw_fd(),
            group_fd,
            pid = target.pid,
            cpu = target.cpu,
            "attached counter"
        );

        Ok(self.perf.insert(perf))
    }

    /// Releases the handle. Closing a detached counter does nothing.
    ///
    /// The counter is detached afterwards even if the kernel reported an error.
    pub fn close(&mut self) -> Result<()> {
        match self.perf.take() {
            Some(perf) => close(perf),
            None => Ok(()),
        }
    }

    fn attached(&self) -> Result<&File> {
        self.perf
            .as_ref()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "counter is not attached"))
    }

    pub(crate) fn ioctl(&self, op: IocOp, arg: u32) -> Result<()> {
        ioctl(self.attached()?, op, arg)?;
        Ok(())
    }

    pub fn enable(&self) -> Result<()> {
        self.ioctl(ioctls::ENABLE, 0)
    }

    pub fn disable(&self) -> Result<()> {
        self.ioctl(ioctls::DISABLE, 0)
    }

    pub fn clear_count(&self) -> Result<()> {
        self.ioctl(ioctls::RESET, 0)
    }

    /// Reads the counter value.
    ///
    /// A group leader whose format includes siblings is read through
    /// [`CounterList::stat`], which knows the group size.
    pub fn stat(&self) -> Result<Stat> {
        self.stat_in_group(1)
    }

    pub(crate) fn stat_in_group(&self, group_size: usize) -> Result<Stat> {
        let perf = self.attached()?;
        let read_format = self.attr.read_format;

        let mut buf = vec![0_u8; Stat::read_buf_size(group_size, read_format)];
        let len = read(perf, &mut buf)?;
        if len < buf.len() {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "short counter read"));
        }

        Ok(unsafe { Stat::from_ptr(buf.as_ptr(), read_format) })
    }
}

impl fmt::Debug for CounterDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterDesc")
            .field("name", &self.name)
            .field("type", &self.attr.type_)
            .field("config", &format_args!("{:#x}", self.attr.config))
            .field("fd", &self.perf.as_ref().map(AsRawFd::as_raw_fd))
            .finish()
    }
}
