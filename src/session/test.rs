use super::Session;
use crate::config::Opts;
use crate::error::Error;
use crate::event::resolve::{Resolved, ResolveError, Resolver};
use crate::event::sw::Software;
use crate::event::Event;
use crate::ffi::bindings as b;

// Resolves every name to the dummy software event.
struct Dummy;

impl Resolver for Dummy {
    fn resolve(&self, _: &str) -> Result<Resolved, ResolveError> {
        Ok(Resolved {
            event: Event::try_from(Software::Dummy)?,
            exclude: None,
        })
    }
}

#[test]
fn test_add_dispatches_on_prefix() {
    let mut session = Session::new(Opts::default());
    assert_eq!(session.add("cycles").unwrap(), 0);
    assert_eq!(session.add("raw:0xc0").unwrap(), 1);

    let ctrs = session.ctrs();
    assert_eq!(ctrs.get(0).unwrap().attr().type_, b::PERF_TYPE_HARDWARE as u32);
    assert_eq!(ctrs.get(1).unwrap().attr().type_, b::PERF_TYPE_RAW as u32);
    assert_eq!(ctrs.get(1).unwrap().name(), "raw:0xc0");

    let err = session.add("raw:").unwrap_err();
    assert!(matches!(err, Error::Resolve(ResolveError::MalformedRaw { .. })));
    assert_eq!(session.ctrs().len(), 2);
}

#[test]
fn test_base_copied_at_add() {
    let mut session = Session::new(Opts::for_launch());
    session.add("task-clock").unwrap();

    session.base_mut().enable_on_exec = false;
    session.base_mut().exclude.kernel = true;
    session.add("task-clock").unwrap();

    let ctrs = session.into_ctrs();
    let first = ctrs.get(0).unwrap().attr();
    let second = ctrs.get(1).unwrap().attr();
    assert_eq!(first.enable_on_exec(), 1);
    assert_eq!(first.exclude_kernel(), 0);
    assert_eq!(second.enable_on_exec(), 0);
    assert_eq!(second.exclude_kernel(), 1);
    assert_eq!(first.disabled(), 1);
}

#[test]
fn test_custom_resolver() {
    let mut session = Session::with_resolver(Opts::default(), Dummy);
    session.add("anything").unwrap();
    let attr = session.ctrs().get(0).unwrap().attr();
    assert_eq!(attr.type_, b::PERF_TYPE_SOFTWARE as u32);
    assert_eq!(attr.config, b::PERF_COUNT_SW_DUMMY as u64);
}

#[test]
fn test_enable_conflicts_with_enable_on_exec() {
    let mut opts = Opts::for_launch();
    opts.enable = true;
    let mut session = Session::new(opts);
    let err = session.add("task-clock").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(session.ctrs().is_empty());
}
