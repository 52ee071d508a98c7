
use std::ffi::{c_char, CString, OsStr, OsString};
use std::fs::File;
use std::io::{self, ErrorKind};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitStatus;
use std::ptr;

use tracing::{debug, warn};

use crate::config::{All, CpuSel, Proc, Target};
use crate::count::CounterList;
use crate::error::{Error, Result};
use crate::ffi::syscall::{execvp, fork, kill, perf_event_open, pipe, read, waitpid};
use crate::ffi::Attr;
use crate::util::write_all;

type PreExec = Box<dyn FnMut() -> io::Result<()> + Send + Sync>;

/// Launches a program with a counter list attached before its first instruction.
///
/// The child forks, runs the [pre-exec hook][Self::pre_exec] if any and then
/// waits. The parent attaches the whole list to the child and only then lets
/// it call `execvp`, so no counter can miss the start of the program. Build the
/// counters with [`Opts::for_launch`][crate::config::Opts::for_launch] to keep
/// them disabled until the new image starts.
///
/// If the counters cannot be attached the child is killed before it can
/// exec, a failed launch never leaves an unmonitored target running.
///
/// # Examples
///
/// ```rust
/// use perf_ctrs::config::Opts;
/// use perf_ctrs::count::CounterList;
/// use perf_ctrs::event::resolve::Generic;
/// use perf_ctrs::launch::Launcher;
///
/// let mut opts = Opts::for_launch();
/// opts.exclude.kernel = true;
///
/// let mut ctrs = CounterList::new();
/// ctrs.resolve_named(&Generic, "task-clock", &opts).unwrap();
///
/// let Ok(mut child) = Launcher::new("true").spawn(&mut ctrs) else {
///     return; // No access to `perf_event_open`.
/// };
/// assert!(child.wait().unwrap().success());
///
/// println!("{} ns", ctrs.stat().unwrap().count);
/// ```
pub struct Launcher {
    program: OsString,
    args: Vec<OsString>,
    cpu: CpuSel,
    flags: u64,
    pre_exec: Option<PreExec>,
}

impl Launcher {
    /// The program is looked up in `PATH` like `execvp` does, and is also `argv[0]`.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        let program = program.as_ref().to_os_string();
        Self {
            args: vec![program.clone()],
            program,
            cpu: All.into(),
            flags: 0,
            pre_exec: None,
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Restricts the counters to one CPU, defaults to all CPUs.
    pub fn cpu(&mut self, cpu: impl Into<CpuSel>) -> &mut Self {
        self.cpu = cpu.into();
        self
    }

    /// `PERF_FLAG_*` bits used when attaching the counters.
    pub fn flags(&mut self, flags: u64) -> &mut Self {
        self.flags = flags;
        self
    }

    /// Registers a closure to run in the child after `fork` and before the
    /// counters are attached, e.g. to drop privileges or rearrange file descriptors.
    ///
    /// An error aborts the launch with [`Error::Hook`]. The errno is carried
    /// over to the parent, errors without one arrive as `EINVAL`.
    ///
    /// # Safety
    ///
    /// The closure runs in a forked copy of a possibly multithreaded process,
    /// it must only perform async-signal-safe operations, see
    /// [`CommandExt::pre_exec`](std::os::unix::process::CommandExt::pre_exec).
    pub unsafe fn pre_exec<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut() -> io::Result<()> + Send + Sync + 'static,
    {
        self.pre_exec = Some(Box::new(f));
        self
    }

    /// Forks, attaches `ctrs` to the child and execs the program.
    ///
    /// Returns once the program image has been replaced; the caller owns the
    /// child from then on. On error no child is left running and the list is
    /// detached.
    ///
    /// Every counter must be enabled by the time the program starts, a
    /// counter that is disabled without `enable_on_exec` is rejected with
    /// [`Error::NotEnabledAtExec`] before forking.
    pub fn spawn(&mut self, ctrs: &mut CounterList) -> Result<Child> {
        self.spawn_with(ctrs, &mut perf_event_open)
    }

    pub(crate) fn spawn_with<F>(&mut self, ctrs: &mut CounterList, open: &mut F) -> Result<Child>
    where
        F: FnMut(&Attr, i32, i32, i32, u64) -> io::Result<File>,
    {
        ctrs.check_detached()?;
        check_enabled_at_exec(ctrs)?;

        // Everything the child touches is allocated before forking.
        let program = CString::new(self.program.as_bytes())?;
        let args = self
            .args
            .iter()
            .map(|it| CString::new(it.as_bytes()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut argv: Vec<*const c_char> = args.iter().map(|it| it.as_ptr()).collect();
        argv.push(ptr::null());

        let (mut status_rx, status_tx) = pipe()?;
        let (go_rx, go_tx) = pipe()?;

        let pid = unsafe { fork() }.map_err(Error::Fork)?;
        if pid == 0 {
            drop(status_rx);
            drop(go_tx);
            let hook = self.pre_exec.as_mut();
            unsafe { child(status_tx, go_rx, &program, &argv, hook) }
        }
        drop(status_tx);
        drop(go_rx);

        let name = self.program.to_string_lossy();
        debug!(pid, program = %name, "forked launch child");

        match Record::read(&mut status_rx) {
            Ok(Some(Record::Ready)) => (),
            Ok(Some(Record::Hook(errno))) => {
                reap(pid);
                let source = io::Error::from_raw_os_error(errno);
                return Err(Error::Hook { pid, source });
            }
            Ok(Some(Record::Exec(_))) => {
                kill_and_reap(pid);
                let source =
                    io::Error::new(ErrorKind::InvalidData, "child exec'd before attachment");
                return Err(Error::Handshake { pid, source });
            }
            Ok(None) => {
                reap(pid);
                let source =
                    io::Error::new(ErrorKind::UnexpectedEof, "child exited before it was ready");
                return Err(Error::Handshake { pid, source });
            }
            Err(source) => {
                kill_and_reap(pid);
                return Err(Error::Handshake { pid, source });
            }
        }

        let target = Target::from((Proc(pid as _), self.cpu));
        if let Err(e) = ctrs.attach_with(&target, self.flags, open) {
            // The child reads EOF and exits without exec, kill it anyway.
            drop(go_tx);
            kill_and_reap(pid);
            return Err(e);
        }
        debug!(pid, ctrs = ctrs.len(), "attached counters to launch child");

        if let Err(source) = write_all(&go_tx, &[GO]) {
            ctrs.close();
            kill_and_reap(pid);
            return Err(Error::Handshake { pid, source });
        }
        drop(go_tx);

        // The status pipe is close-on-exec: EOF means the program image was replaced.
        match Record::read(&mut status_rx) {
            Ok(None) => {
                debug!(pid, program = %name, "launch child exec'd");
                Ok(Child { pid })
            }
            Ok(Some(Record::Exec(errno))) => {
                reap(pid);
                ctrs.close();
                let source = io::Error::from_raw_os_error(errno);
                Err(Error::Exec {
                    pid,
                    program: name.into_owned(),
                    source,
                })
            }
            Ok(Some(_)) => {
                kill_and_reap(pid);
                ctrs.close();
                let source = io::Error::new(ErrorKind::InvalidData, "unexpected status from child");
                Err(Error::Handshake { pid, source })
            }
            Err(source) => {
                kill_and_reap(pid);
                ctrs.close();
                Err(Error::Handshake { pid, source })
            }
        }
    }
}

fn check_enabled_at_exec(ctrs: &CounterList) -> Result<()> {
    let idle = ctrs
        .iter()
        .position(|it| it.attr().disabled() == 1 && it.attr().enable_on_exec() == 0);
    match idle {
        Some(index) => Err(Error::NotEnabledAtExec {
            index,
            name: ctrs.get(index).map(|it| it.name().to_string()).unwrap_or_default(),
        }),
        None => Ok(()),
    }
}

const GO: u8 = 1;

// Status records sent from the child to the parent:
// u32 stage, i32 errno, native endian.
#[derive(Debug, PartialEq, Eq)]
enum Record {
    Ready,
    Hook(i32),
    Exec(i32),
}

impl Record {
    const LEN: usize = 8;

    fn to_bytes(&self) -> [u8; Self::LEN] {
        let (stage, errno) = match *self {
            Record::Ready => (0_u32, 0),
            Record::Hook(errno) => (1, errno),
            Record::Exec(errno) => (2, errno),
        };
        let mut buf = [0; Self::LEN];
        buf[..4].copy_from_slice(&stage.to_ne_bytes());
        buf[4..].copy_from_slice(&errno.to_ne_bytes());
        buf
    }

    fn from_bytes(buf: [u8; Self::LEN]) -> io::Result<Self> {
        let [s0, s1, s2, s3, e0, e1, e2, e3] = buf;
        let errno = i32::from_ne_bytes([e0, e1, e2, e3]);
        match u32::from_ne_bytes([s0, s1, s2, s3]) {
            0 => Ok(Record::Ready),
            1 => Ok(Record::Hook(errno)),
            2 => Ok(Record::Exec(errno)),
            _ => Err(io::Error::new(ErrorKind::InvalidData, "unknown status record")),
        }
    }

    // `None` on EOF before the first byte.
    fn read(file: &mut File) -> io::Result<Option<Self>> {
        let mut buf = [0; Self::LEN];
        let mut filled = 0;
        while filled < Self::LEN {
            match read(file, &mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) => return Err(e),
            }
        }
        Self::from_bytes(buf).map(Some)
    }
}

// Runs in the forked child: no allocation, no unwinding, never returns.
// A panicking hook is reported like a hook error without an errno.
unsafe fn child(
    status: File,
    go: File,
    program: &CString,
    argv: &[*const c_char],
    hook: Option<&mut PreExec>,
) -> ! {
    let errno = |e: &io::Error| e.raw_os_error().unwrap_or(libc::EINVAL);

    if let Some(hook) = hook {
        let failed = match panic::catch_unwind(AssertUnwindSafe(|| (*hook)())) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(errno(&e)),
            Err(_) => Some(libc::EINVAL),
        };
        if let Some(errno) = failed {
            let _ = write_all(&status, &Record::Hook(errno).to_bytes());
            libc::_exit(127);
        }
    }

    if write_all(&status, &Record::Ready.to_bytes()).is_err() {
        libc::_exit(127);
    }

    let mut buf = [0];
    loop {
        match read(&go, &mut buf) {
            Ok(1) if buf[0] == GO => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => (),
            // The parent gave up on this launch.
            _ => libc::_exit(127),
        }
    }

    // Ignored signals stay ignored across exec, give the program the default.
    libc::signal(libc::SIGPIPE, libc::SIG_DFL);

    let e = execvp(program, argv);
    let _ = write_all(&status, &Record::Exec(errno(&e)).to_bytes());
    libc::_exit(127)
}

fn reap(pid: i32) {
    if let Err(e) = waitpid(pid, 0) {
        warn!(pid, error = %e, "failed to reap launch child");
    }
}

fn kill_and_reap(pid: i32) {
    if let Err(e) = kill(pid, libc::SIGKILL) {
        warn!(pid, error = %e, "failed to kill launch child");
    }
    reap(pid);
}

/// A launched program.
///
/// Like [`std::process::Child`], dropping it neither kills nor reaps the process.
#[derive(Debug)]
pub struct Child {
    pid: i32,
}

impl Child {
    pub fn id(&self) -> u32 {
        self.pid as _
    }

    /// Waits for the program to exit and reaps it.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        let (_, status) = waitpid(self.pid, 0)?;
        Ok(ExitStatus::from_raw(status))
    }

    /// Sends `SIGKILL` to the program.
    pub fn kill(&mut self) -> io::Result<()> {
        kill(self.pid, libc::SIGKILL)
    }
}
