use std::fs::File;
use std::os::fd::AsRawFd;

use crate::ffi::bindings as b;

#[derive(Clone, Copy, Debug)]
pub struct All;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cpu(pub u32);

impl Cpu {
    pub const ALL: All = All;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Proc(pub u32);

impl Proc {
    pub const ALL: All = All;
    pub const CURRENT: Proc = Proc(0);
}

#[derive(Clone, Copy, Debug)]
pub struct Cgroup<'a>(pub &'a File);

/// The (process, CPU) pair a counter or a counter group is attached to.
///
/// Build it from a pair of selectors, e.g. `(Proc(pid), Cpu::ALL)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub(crate) pid: i32,
    pub(crate) cpu: i32,
    pub(crate) flags: u64,
}

impl Target {
    /// Process selector as passed to the kernel: `0` is the calling process,
    /// `-1` is every process.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// CPU selector as passed to the kernel: `-1` is any CPU.
    pub fn cpu(&self) -> i32 {
        self.cpu
    }
}

/// CPU selector accepted by [`Launcher::cpu`][crate::launch::Launcher::cpu].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuSel(pub(crate) i32);

impl From<Cpu> for CpuSel {
    fn from(Cpu(cpu): Cpu) -> Self {
        Self(cpu as _)
    }
}

impl From<All> for CpuSel {
    fn from(_: All) -> Self {
        Self(-1)
    }
}

impl From<(Proc, CpuSel)> for Target {
    fn from((Proc(pid), CpuSel(cpu)): (Proc, CpuSel)) -> Self {
        Target {
            pid: pid as _,
            cpu,
            flags: 0,
        }
    }
}

macro_rules! into_target {
    ($ty: ty, $destruct: tt, $pid: expr, $cpu: expr, $flags: expr) => {
        impl From<$ty> for Target {
            fn from($destruct: $ty) -> Self {
                Target {
                    pid: $pid as _,
                    cpu: $cpu as _,
                    flags: $flags as _,
                }
            }
        }
    };
}

into_target!((Proc, Cpu), (Proc(pid), Cpu(cpu)), pid, cpu, 0);
into_target!((Cpu, Proc), (Cpu(cpu), Proc(pid)), pid, cpu, 0);

into_target!((Proc, All), (Proc(pid), _), pid, -1, 0);
into_target!((All, Proc), (_, Proc(pid)), pid, -1, 0);

into_target!((Cpu, All), (Cpu(cpu), _), -1, cpu, 0);
into_target!((All, Cpu), (_, Cpu(cpu)), -1, cpu, 0);

into_target!(
    (Cgroup<'_>, Cpu),
    (Cgroup(file), Cpu(cpu)),
    file.as_raw_fd(),
    cpu,
    b::PERF_FLAG_PID_CGROUP
);
into_target!(
    (Cpu, Cgroup<'_>),
    (Cpu(cpu), Cgroup(file)),
    file.as_raw_fd(),
    cpu,
    b::PERF_FLAG_PID_CGROUP
);

// No `(All, All)`: the kernel rejects pid == -1 together with cpu == -1.
