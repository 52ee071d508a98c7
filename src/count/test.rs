use std::fs::File;
use std::io::{self, ErrorKind};
use std::os::fd::AsRawFd;

use super::{CounterDesc, CounterList};
use crate::config::{All, Cpu, Opts, Proc, Target};
use crate::error::Error;
use crate::event::resolve::Generic;
use crate::event::sw::Software;
use crate::ffi::{attr_bytes, bindings as b, Attr};

#[derive(Debug)]
struct Call {
    attr: Vec<u8>,
    pid: i32,
    cpu: i32,
    group_fd: i32,
    flags: u64,
}

// Records every open and hands out `/dev/null` instead of a counter,
// failing the call with index `fail_at`.
struct Recorder {
    calls: Vec<Call>,
    fail_at: Option<usize>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            calls: vec![],
            fail_at: None,
        }
    }

    fn open(
        &mut self,
        attr: &Attr,
        pid: i32,
        cpu: i32,
        group_fd: i32,
        flags: u64,
    ) -> io::Result<File> {
        let index = self.calls.len();
        self.calls.push(Call {
            attr: attr_bytes(attr).to_vec(),
            pid,
            cpu,
            group_fd,
            flags,
        });
        if self.fail_at == Some(index) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        File::open("/dev/null")
    }
}

fn list_of(n: usize) -> CounterList {
    let opts = Opts::default();
    (0..n)
        .map(|i| {
            let event = match i % 2 {
                0 => Software::TaskClock,
                _ => Software::PageFault,
            };
            CounterDesc::from_event(format!("ctr{}", i), event, &opts).unwrap()
        })
        .collect()
}

fn attach(list: &mut CounterList, target: Target, rec: &mut Recorder) -> Result<(), Error> {
    list.attach_with(&target, 0, &mut |attr: &Attr, pid: i32, cpu: i32, group_fd: i32, flags: u64| {
        rec.open(attr, pid, cpu, group_fd, flags)
    })
}

#[test]
fn test_push_keeps_order() {
    for n in [0, 1, 2, 7, 64] {
        let mut list = CounterList::new();
        for i in 0..n {
            let index = list.push(CounterDesc::new(format!("ctr{}", i), None));
            assert_eq!(index, i);
        }
        assert_eq!(list.len(), n);
        assert_eq!(list.is_empty(), n == 0);
        let names: Vec<_> = list.iter().map(CounterDesc::name).collect();
        let expected: Vec<_> = (0..n).map(|i| format!("ctr{}", i)).collect();
        assert_eq!(names, expected);
    }
}

#[test]
fn test_new_desc_zeroed_or_seeded() {
    let zeroed = CounterDesc::new("zeroed", None);
    assert!(attr_bytes(zeroed.attr()).iter().all(|&it| it == 0));
    assert!(!zeroed.is_attached());

    let base = *list_of(1).get(0).unwrap().attr();
    let seeded = CounterDesc::new("seeded", Some(&base));
    assert_eq!(attr_bytes(seeded.attr()), attr_bytes(&base));
}

#[test]
fn test_attach_propagates_leader() {
    let mut list = list_of(3);
    let mut rec = Recorder::new();
    attach(&mut list, (Proc(42), Cpu::ALL).into(), &mut rec).unwrap();

    assert_eq!(rec.calls.len(), 3);
    assert_eq!(rec.calls[0].group_fd, -1);

    let leader_fd = list.leader().unwrap().file().unwrap().as_raw_fd();
    assert_eq!(rec.calls[1].group_fd, leader_fd);
    assert_eq!(rec.calls[2].group_fd, leader_fd);

    for (call, ctr) in rec.calls.iter().zip(&list) {
        assert!(ctr.is_attached());
        assert_eq!(call.pid, 42);
        assert_eq!(call.cpu, -1);
        assert_eq!(call.attr, attr_bytes(ctr.attr()));
        assert_ne!(call.flags & b::PERF_FLAG_FD_CLOEXEC as u64, 0);
    }
}

#[test]
fn test_attach_cpu_selector_only_differs_in_cpu() {
    let mut any = list_of(2);
    let mut rec_any = Recorder::new();
    attach(&mut any, (Proc(7), All).into(), &mut rec_any).unwrap();

    let mut pinned = list_of(2);
    let mut rec_pinned = Recorder::new();
    attach(&mut pinned, (Proc(7), Cpu(3)).into(), &mut rec_pinned).unwrap();

    for (a, p) in rec_any.calls.iter().zip(&rec_pinned.calls) {
        assert_eq!(a.cpu, -1);
        assert_eq!(p.cpu, 3);
        assert_eq!(a.pid, p.pid);
        assert_eq!(a.attr, p.attr);
        assert_eq!(a.flags, p.flags);
    }
    // Leader opens agree, member group fds point at each list's own leader.
    assert_eq!(rec_any.calls[0].group_fd, rec_pinned.calls[0].group_fd);
}

#[test]
fn test_attach_failure_rolls_back() {
    let mut list = list_of(4);
    let mut rec = Recorder::new();
    rec.fail_at = Some(2);

    let err = attach(&mut list, (Proc(1), Cpu(0)).into(), &mut rec).unwrap_err();
    match err {
        Error::Attach {
            index,
            name,
            pid,
            cpu,
            rolled_back,
            source,
        } => {
            assert_eq!(index, 2);
            assert_eq!(name, "ctr2");
            assert_eq!((pid, cpu), (1, 0));
            assert_eq!(rolled_back, 2);
            assert_eq!(source.raw_os_error(), Some(libc::EINVAL));
        }
        e => panic!("unexpected error: {}", e),
    }

    assert_eq!(rec.calls.len(), 3);
    assert!(!list.is_attached());

    // The list can be attached again after the failure.
    let mut rec = Recorder::new();
    attach(&mut list, (Proc(1), Cpu(0)).into(), &mut rec).unwrap();
    assert!(list.iter().all(CounterDesc::is_attached));
}

#[test]
fn test_attach_twice_rejected() {
    let mut list = list_of(2);
    let mut rec = Recorder::new();
    attach(&mut list, (Proc(1), Cpu::ALL).into(), &mut rec).unwrap();

    let err = attach(&mut list, (Proc(2), Cpu::ALL).into(), &mut rec).unwrap_err();
    assert!(matches!(err, Error::AlreadyAttached { index: 0, .. }));
    assert_eq!(rec.calls.len(), 2);

    let ctr = list.get_mut(1).unwrap();
    let err = ctr
        .attach_with(
            &(Proc(2), Cpu::ALL).into(),
            -1,
            0,
            &mut |attr: &Attr, pid: i32, cpu: i32, group_fd: i32, flags: u64| {
                rec.open(attr, pid, cpu, group_fd, flags)
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn test_close_idempotent() {
    let mut list = list_of(3);
    // Never attached.
    list.close();
    list.close();

    let mut rec = Recorder::new();
    attach(&mut list, (Proc(1), Cpu::ALL).into(), &mut rec).unwrap();
    list.close();
    assert!(!list.is_attached());
    list.close();

    let mut ctr = CounterDesc::new("single", None);
    ctr.close().unwrap();
    ctr.close().unwrap();
}

#[test]
fn test_clone_config_is_detached() {
    let mut list = list_of(2);
    let mut rec = Recorder::new();
    attach(&mut list, (Proc(1), Cpu::ALL).into(), &mut rec).unwrap();

    let copy = list.clone_config();
    assert_eq!(copy.len(), 2);
    assert!(!copy.is_attached());
    for (a, b) in list.iter().zip(&copy) {
        assert_eq!(a.name(), b.name());
        assert_eq!(attr_bytes(a.attr()), attr_bytes(b.attr()));
    }
}

#[test]
fn test_resolve_appends() {
    let opts = Opts::default();
    let mut list = CounterList::new();
    assert_eq!(list.resolve_named(&Generic, "instructions:u", &opts).unwrap(), 0);
    assert_eq!(list.resolve_raw("raw:0x1c2,config1=0x3", &opts).unwrap(), 1);

    let err = list.resolve_named(&Generic, "bogus", &opts).unwrap_err();
    assert!(matches!(err, Error::Resolve(_)));
    let err = list.resolve_raw("raw:zz", &opts).unwrap_err();
    assert!(matches!(err, Error::Resolve(_)));
    assert_eq!(list.len(), 2);

    let instr = list.get(0).unwrap();
    assert_eq!(instr.name(), "instructions:u");
    assert_eq!(instr.attr().type_, b::PERF_TYPE_HARDWARE as u32);
    assert_eq!(instr.attr().config, b::PERF_COUNT_HW_INSTRUCTIONS as u64);
    assert_eq!(instr.attr().exclude_user(), 0);
    assert_eq!(instr.attr().exclude_kernel(), 1);
    assert_eq!(instr.attr().exclude_hv(), 1);

    let raw = list.get(1).unwrap();
    assert_eq!(raw.attr().type_, b::PERF_TYPE_RAW as u32);
    assert_eq!(raw.attr().config, 0x1c2);
    assert_eq!(unsafe { raw.attr().__bindgen_anon_3.config1 }, 0x3);
    assert!(list.iter().all(|it| !it.is_attached()));
}

#[test]
fn test_raw_round_trip_attr() {
    let opts = Opts::default();
    let mut list = CounterList::new();
    let spec = "raw:0xdead,config2=0x10,type=9";
    list.resolve_raw(spec, &opts).unwrap();
    let display = spec.parse::<crate::event::raw::Raw>().unwrap().to_string();
    list.resolve_raw(&display, &opts).unwrap();

    let a = list.get(0).unwrap().attr();
    let b = list.get(1).unwrap().attr();
    assert_eq!(attr_bytes(a), attr_bytes(b));
}

#[test]
fn test_group_ops_need_attachment() {
    let list = list_of(2);
    assert_eq!(list.enable().unwrap_err().kind(), ErrorKind::NotConnected);
    assert_eq!(list.stat().unwrap_err().kind(), ErrorKind::NotConnected);
    assert_eq!(CounterList::new().disable().unwrap_err().kind(), ErrorKind::NotConnected);
}

#[test]
fn test_count_current_process() {
    let mut opts = Opts::default();
    opts.exclude.kernel = true;
    opts.exclude.hv = true;
    opts.stat_format.siblings = true;
    opts.stat_format.time_enabled = true;

    let mut list = CounterList::new();
    list.resolve_named(&Generic, "task-clock", &opts).unwrap();
    list.resolve_named(&Generic, "page-faults", &opts).unwrap();

    if let Err(e) = list.attach((Proc::CURRENT, Cpu::ALL), 0) {
        eprintln!("Skipping test: perf_event_open unavailable: {}", e);
        return;
    }

    list.enable().unwrap();
    let mut buf = vec![0_u8; 1 << 22];
    for i in (0..buf.len()).step_by(4096) {
        buf[i] = 1;
    }
    std::hint::black_box(&buf);
    list.disable().unwrap();

    let stat = list.stat().unwrap();
    assert!(stat.count > 0);
    assert!(stat.time_enabled.unwrap() > 0);
    assert_eq!(stat.siblings.len(), 1);
    assert!(stat.siblings[0].count > 0);

    list.close();
    assert!(!list.is_attached());
}
