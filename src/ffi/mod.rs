use std::ptr;

pub mod syscall;

pub use perf_event_open_sys::bindings;

// Reads the value at the pointer and offsets it by the size of the
// pointee type. Read buffers are byte vectors, so no alignment is assumed.
#[inline]
pub unsafe fn deref_offset<T: Copy>(ptr: &mut *const u8) -> T {
    let val = ptr::read_unaligned(*ptr as *const T);
    *ptr = ptr.add(size_of::<T>());
    val
}

/// The kernel `perf_event_attr` structure.
pub type Attr = bindings::perf_event_attr;

/// Views an attribute block as the bytes handed to the kernel.
///
/// `perf_event_attr` is laid out without padding, every byte is initialized.
#[cfg(test)]
pub fn attr_bytes(attr: &Attr) -> &[u8] {
    let ptr = attr as *const Attr as *const u8;
    unsafe { std::slice::from_raw_parts(ptr, size_of::<Attr>()) }
}
