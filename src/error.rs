use std::ffi::NulError;
use std::io;

use thiserror::Error;

use crate::event::resolve::ResolveError;

/// Errors reported by counter lists and the launch protocol.
///
/// Nothing is retried: the caller decides whether to fall back to another
/// event, another target or to give up.
#[derive(Debug, Error)]
pub enum Error {
    /// The descriptor already holds a handle, nothing was opened.
    #[error("counter #{index} ({name}) is already attached")]
    AlreadyAttached { index: usize, name: String },

    /// The kernel refused to open a counter.
    ///
    /// Handles opened earlier in the same pass (`rolled_back` of them, the
    /// group leader included) have already been released, so the list is
    /// back to fully detached.
    #[error("failed to attach counter #{index} ({name}) to pid {pid} on cpu {cpu}, released {rolled_back} earlier counters")]
    Attach {
        index: usize,
        name: String,
        pid: i32,
        cpu: i32,
        rolled_back: usize,
        #[source]
        source: io::Error,
    },

    /// The counter would stay disabled in the launched program: it is
    /// neither enabled up front nor enabled on exec.
    #[error("counter #{index} ({name}) is never enabled in the launched program")]
    NotEnabledAtExec { index: usize, name: String },

    #[error("failed to fork")]
    Fork(#[source] io::Error),

    /// The child died or the channel broke before the child could exec.
    #[error("launch handshake with child {pid} failed")]
    Handshake {
        pid: i32,
        #[source]
        source: io::Error,
    },

    #[error("pre-exec hook failed in child {pid}")]
    Hook {
        pid: i32,
        #[source]
        source: io::Error,
    },

    /// The child could not replace its image, it has been reaped.
    #[error("failed to execute {program:?} in child {pid}")]
    Exec {
        pid: i32,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("launch argument contains a nul byte")]
    Nul(#[from] NulError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
