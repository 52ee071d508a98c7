use std::fs::File;
use std::io::{self, ErrorKind};
use std::os::fd::AsRawFd;
use std::slice;

use perf_event_open_sys::ioctls;
use tracing::warn;

use super::{CounterDesc, Stat};
use crate::config::attr::from;
use crate::config::{Opts, Target};
use crate::error::{Error, Result};
use crate::event::raw::Raw;
use crate::event::resolve::Resolver;
use crate::ffi::syscall::{perf_event_open, IocOp};
use crate::ffi::{bindings as b, Attr};

/// Ordered, append-only list of counters that is attached as one group.
///
/// The first counter is the group leader, every later counter joins its group.
/// The kernel schedules a group onto the PMU as a unit, so the member values
/// count the same set of executed instructions.
///
/// # Examples
///
/// ```rust
/// use perf_ctrs::config::{Opts, Proc, Cpu};
/// use perf_ctrs::count::{CounterDesc, CounterList};
/// use perf_ctrs::event::sw::Software;
///
/// let mut opts = Opts::default();
/// opts.stat_format.siblings = true;
///
/// let mut ctrs = CounterList::new();
/// ctrs.push(CounterDesc::from_event("task-clock", Software::TaskClock, &opts).unwrap());
/// ctrs.push(CounterDesc::from_event("page-faults", Software::PageFault, &opts).unwrap());
///
/// # if ctrs.attach((Proc::CURRENT, Cpu::ALL), 0).is_err() { return; }
/// ctrs.enable().unwrap();
/// let v = std::hint::black_box(vec![0_u8; 1 << 20]);
/// ctrs.disable().unwrap();
///
/// let stat = ctrs.stat().unwrap();
/// println!("{} ns, {} page faults", stat.count, stat.siblings[0].count);
/// # drop(v);
///
/// ctrs.close();
/// ```
#[derive(Debug, Default)]
pub struct CounterList {
    ctrs: Vec<CounterDesc>,
}

impl CounterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a counter and returns its index.
    pub fn push(&mut self, ctr: CounterDesc) -> usize {
        self.ctrs.push(ctr);
        self.ctrs.len() - 1
    }

    pub fn len(&self) -> usize {
        self.ctrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctrs.is_empty()
    }

    /// Returns the counters in insertion order.
    pub fn iter(&self) -> slice::Iter<'_, CounterDesc> {
        self.ctrs.iter()
    }

    pub fn get(&self, index: usize) -> Option<&CounterDesc> {
        self.ctrs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CounterDesc> {
        self.ctrs.get_mut(index)
    }

    /// Returns the group leader.
    pub fn leader(&self) -> Option<&CounterDesc> {
        self.ctrs.first()
    }

    /// Returns `true` if any counter holds a handle.
    pub fn is_attached(&self) -> bool {
        self.ctrs.iter().any(CounterDesc::is_attached)
    }

    /// Copies the counter definitions into a new, detached list.
    pub fn clone_config(&self) -> Self {
        let ctrs = self
            .ctrs
            .iter()
            .map(|it| CounterDesc::new(it.name.clone(), Some(&it.attr)))
            .collect();
        Self { ctrs }
    }

    /// Resolves a symbolic event name and appends the counter.
    ///
    /// Nothing is appended if the name cannot be resolved.
    pub fn resolve_named<R>(&mut self, resolver: &R, name: &str, opts: &Opts) -> Result<usize>
    where
        R: Resolver + ?Sized,
    {
        let resolved = resolver.resolve(name)?;
        let attr = match resolved.exclude {
            Some(exclude) => {
                let opts = Opts {
                    exclude,
                    ..opts.clone()
                };
                from(resolved.event.0, &opts)?
            }
            None => from(resolved.event.0, opts)?,
        };
        Ok(self.push(CounterDesc::new(name, Some(&attr))))
    }

    /// Parses a raw event spec such as `raw:0x1c2` and appends the counter.
    ///
    /// See [`Raw`] for the accepted syntax.
    pub fn resolve_raw(&mut self, spec: &str, opts: &Opts) -> Result<usize> {
        let raw: Raw = spec.parse()?;
        let ctr = CounterDesc::from_event(spec, raw, opts)?;
        Ok(self.push(ctr))
    }

    /// Attaches every counter to `target` as a single group.
    ///
    /// The first counter is opened with no group and becomes the leader, the
    /// others are opened with the leader's handle as their group. `flags` are
    /// `PERF_FLAG_*` bits passed with every open.
    ///
    /// If any counter fails, the counters opened in this pass are released
    /// before [`Error::Attach`] is returned, the list is fully detached again.
    /// A list holding any handle is rejected with [`Error::AlreadyAttached`].
    pub fn attach(&mut self, target: impl Into<Target>, flags: u64) -> Result<()> {
        self.attach_with(&target.into(), flags, &mut perf_event_open)
    }

    pub(crate) fn attach_with<F>(&mut self, target: &Target, flags: u64, open: &mut F) -> Result<()>
    where
        F: FnMut(&Attr, i32, i32, i32, u64) -> io::Result<File>,
    {
        self.check_detached()?;

        let mut group_fd = -1;
        for index in 0..self.ctrs.len() {
            match self.ctrs[index].attach_with(target, group_fd, flags, open) {
                Ok(perf) if index == 0 => group_fd = perf.as_raw_fd(),
                Ok(_) => (),
                Err(source) => {
                    self.close_range(..index);
                    return Err(Error::Attach {
                        index,
                        name: self.ctrs[index].name.clone(),
                        pid: target.pid,
                        cpu: target.cpu,
                        rolled_back: index,
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    pub(crate) fn check_detached(&self) -> Result<()> {
        match self.ctrs.iter().enumerate().find(|(_, it)| it.is_attached()) {
            Some((index, ctr)) => Err(Error::AlreadyAttached {
                index,
                name: ctr.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Releases every handle in the list.
    ///
    /// Detached counters are skipped, so closing twice is harmless. A failed
    /// release is logged and the counter is detached anyway.
    pub fn close(&mut self) {
        self.close_range(..);
    }

    fn close_range<R>(&mut self, range: R)
    where
        R: slice::SliceIndex<[CounterDesc], Output = [CounterDesc]>,
    {
        for ctr in &mut self.ctrs[range] {
            if let Err(e) = ctr.close() {
                warn!(name = %ctr.name, error = %e, "failed to release counter");
            }
        }
    }

    fn leader_ioctl(&self, op: IocOp) -> io::Result<()> {
        let leader = self
            .leader()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "counter list is empty"))?;
        leader.ioctl(op, b::PERF_IOC_FLAG_GROUP as _)
    }

    /// Enables all counters in the group.
    pub fn enable(&self) -> io::Result<()> {
        self.leader_ioctl(ioctls::ENABLE)
    }

    /// Disables all counters in the group.
    pub fn disable(&self) -> io::Result<()> {
        self.leader_ioctl(ioctls::DISABLE)
    }

    /// Clears the counts of all counters in the group.
    pub fn clear_count(&self) -> io::Result<()> {
        self.leader_ioctl(ioctls::RESET)
    }

    /// Reads the group leader.
    ///
    /// With [`StatFormat::siblings`][crate::config::StatFormat::siblings] set on
    /// the leader, the other counters are returned in list order.
    pub fn stat(&self) -> io::Result<Stat> {
        let leader = self
            .leader()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "counter list is empty"))?;
        leader.stat_in_group(self.ctrs.len())
    }
}

impl<'a> IntoIterator for &'a CounterList {
    type Item = &'a CounterDesc;
    type IntoIter = slice::Iter<'a, CounterDesc>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<CounterDesc> for CounterList {
    fn from_iter<T: IntoIterator<Item = CounterDesc>>(iter: T) -> Self {
        Self {
            ctrs: iter.into_iter().collect(),
        }
    }
}
