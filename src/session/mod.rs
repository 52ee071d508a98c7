#[cfg(test)]
mod test;

use crate::config::{Opts, Target};
use crate::count::CounterList;
use crate::error::Result;
use crate::event::raw::Raw;
use crate::event::resolve::{Generic, Resolver};
use crate::launch::{Child, Launcher};

/// A base configuration, a resolver and the counter list built from them.
///
/// Every counter added through the session copies the base options at the
/// time it is added, changing them later does not touch existing counters.
///
/// # Examples
///
/// ```rust
/// use perf_ctrs::config::Opts;
/// use perf_ctrs::session::Session;
///
/// let mut opts = Opts::for_launch();
/// opts.exclude.kernel = true;
///
/// let mut session = Session::new(opts);
/// session.add("task-clock").unwrap();
/// session.add("raw:0xc0").unwrap();
/// assert_eq!(session.ctrs().len(), 2);
/// ```
#[derive(Debug)]
pub struct Session<R = Generic> {
    base: Opts,
    resolver: R,
    ctrs: CounterList,
}

impl Session {
    pub fn new(base: Opts) -> Self {
        Self::with_resolver(base, Generic)
    }
}

impl<R: Resolver> Session<R> {
    pub fn with_resolver(base: Opts, resolver: R) -> Self {
        Self {
            base,
            resolver,
            ctrs: CounterList::new(),
        }
    }

    pub fn base(&self) -> &Opts {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Opts {
        &mut self.base
    }

    /// Appends a counter for `event` and returns its index.
    ///
    /// Specs starting with `raw:` are parsed as [`Raw`] events,
    /// everything else goes through the resolver.
    pub fn add(&mut self, event: &str) -> Result<usize> {
        if event.starts_with(Raw::PREFIX) {
            self.ctrs.resolve_raw(event, &self.base)
        } else {
            self.ctrs.resolve_named(&self.resolver, event, &self.base)
        }
    }

    pub fn ctrs(&self) -> &CounterList {
        &self.ctrs
    }

    pub fn ctrs_mut(&mut self) -> &mut CounterList {
        &mut self.ctrs
    }

    pub fn into_ctrs(self) -> CounterList {
        self.ctrs
    }

    /// Attaches the counters to an existing target, see [`CounterList::attach`].
    pub fn attach(&mut self, target: impl Into<Target>, flags: u64) -> Result<()> {
        self.ctrs.attach(target, flags)
    }

    /// Launches a program with the counters attached, see [`Launcher`].
    pub fn spawn(&mut self, launcher: &mut Launcher) -> Result<Child> {
        launcher.spawn(&mut self.ctrs)
    }
}
