use std::fs;
use std::io::{Error, ErrorKind, Result};
use std::ptr::NonNull;
use std::slice;
use std::sync::LazyLock;

use tracing::{debug, warn};

use crate::ffi::syscall::{madvise, mmap_anon, munmap};

const DEFAULT_HUGE_PAGE_SIZE: usize = 2 << 20;

/// Huge page size of the running kernel, from the `Hugepagesize` line of `/proc/meminfo`.
pub static HUGE_PAGE_SIZE: LazyLock<usize> = LazyLock::new(|| {
    fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|meminfo| {
            let line = meminfo.lines().find(|it| it.starts_with("Hugepagesize:"))?;
            let kb = line.split_whitespace().nth(1)?.parse::<usize>().ok()?;
            Some(kb << 10)
        })
        .unwrap_or(DEFAULT_HUGE_PAGE_SIZE)
});

/// Anonymous memory backed by huge pages where the kernel allows it,
/// e.g. for sample ring buffers copied out of the kernel.
///
/// Reserved huge pages (`MAP_HUGETLB`) are tried first, then a normal mapping
/// advised for transparent huge pages. The memory is zeroed and unmapped on drop.
pub struct HugeMem {
    ptr: NonNull<u8>,
    len: usize,
    huge: bool,
}

impl HugeMem {
    /// Maps at least `len` bytes, rounded up to the huge page size.
    pub fn alloc(len: usize) -> Result<Self> {
        let page = *HUGE_PAGE_SIZE;
        let Some(len) = len.checked_next_multiple_of(page).filter(|&it| it > 0) else {
            return Err(Error::new(ErrorKind::InvalidInput, "invalid allocation size"));
        };

        match unsafe { mmap_anon::<u8>(len, libc::MAP_HUGETLB) } {
            Ok(ptr) => {
                debug!(len, "mapped reserved huge pages");
                return Self::from_raw(ptr, len, true);
            }
            Err(e) => debug!(len, error = %e, "no reserved huge pages, falling back"),
        }

        let ptr = unsafe { mmap_anon::<u8>(len, 0) }?;
        if let Err(e) = unsafe { madvise(ptr, len, libc::MADV_HUGEPAGE) } {
            warn!(len, error = %e, "transparent huge pages unavailable");
        }
        Self::from_raw(ptr, len, false)
    }

    fn from_raw(ptr: *mut u8, len: usize, huge: bool) -> Result<Self> {
        let ptr = NonNull::new(ptr).ok_or_else(|| Error::other("mmap returned null"))?;
        Ok(Self { ptr, len, huge })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if the memory is backed by reserved huge pages.
    pub fn is_huge(&self) -> bool {
        self.huge
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for HugeMem {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr(), self.len) } {
            warn!(len = self.len, error = %e, "failed to unmap huge memory");
        }
    }
}

// The mapping is exclusively owned.
unsafe impl Send for HugeMem {}
unsafe impl Sync for HugeMem {}
