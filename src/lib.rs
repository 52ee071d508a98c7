//! Ordered counter lists for the `perf_event_open` system call.
//!
//! A [`CounterList`][count::CounterList] holds counter descriptors in the order
//! they were added. Attaching it opens every counter as one group led by the
//! first counter, either on an existing process or on a program started by a
//! [`Launcher`][launch::Launcher], which attaches the counters after fork and
//! before the program's first instruction runs.
//!
//! ## Example
//!
//! Count task clock and page faults of `ls`, from exec to exit.
//!
//! ```rust
//! use perf_ctrs::config::Opts;
//! use perf_ctrs::count::CounterList;
//! use perf_ctrs::launch::Launcher;
//! use perf_ctrs::bindings::PERF_FLAG_FD_CLOEXEC;
//!
//! let mut opts = Opts::for_launch();
//! opts.stat_format.siblings = true;
//!
//! let mut ctrs = CounterList::new();
//! ctrs.resolve_named(&perf_ctrs::event::resolve::Generic, "task-clock", &opts).unwrap();
//! ctrs.resolve_named(&perf_ctrs::event::resolve::Generic, "page-faults", &opts).unwrap();
//!
//! let mut launcher = Launcher::new("ls");
//! launcher.arg("/").flags(PERF_FLAG_FD_CLOEXEC as _);
//!
//! // Running without perf access (e.g. `perf_event_paranoid` > 2) fails here.
//! if let Ok(mut child) = launcher.spawn(&mut ctrs) {
//!     child.wait().unwrap();
//!     let stat = ctrs.stat().unwrap();
//!     println!("{} ns, {} page faults", stat.count, stat.siblings[0].count);
//! }
//! ```
//!
//! A [`Session`][session::Session] bundles a base [`Opts`][config::Opts], a
//! resolver and a list for callers that build the list from event names.

#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("perf_event_open is only available on Linux and Android");

pub mod config;
pub mod count;
mod error;
pub mod event;
mod ffi;
pub mod launch;
pub mod session;
pub mod util;

pub use error::{Error, Result};
pub use ffi::{bindings, Attr};
