//! OS page provider: anonymous, private, read-write mappings.
//!
//! Grounded on the teacher crate's `os.rs`, trimmed to the Unix `mmap`/`munmap`
//! half — the Windows `VirtualAlloc` half is dropped entirely (see DESIGN.md).

use core::ptr;

/// Cached result of `sysconf(_SC_PAGESIZE)`. The page size never changes for
/// the lifetime of a process, so there is no need to re-syscall on every
/// `map`/`unmap`.
fn page_size_raw() -> usize {
    use std::sync::OnceLock;
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if sz > 0 {
            sz as usize
        } else {
            4096
        }
    })
}

/// The platform page size.
pub fn page_size() -> usize {
    page_size_raw()
}

/// Round `bytes` up to the next whole page.
pub fn round_up_to_page(bytes: usize) -> usize {
    let ps = page_size_raw();
    (bytes + ps - 1) / ps * ps
}

/// Request a private, anonymous, read-write mapping of at least `bytes`,
/// rounded up to a whole number of pages. Returns `None` and logs the OS
/// error on failure.
pub fn map(bytes: usize) -> Option<*mut u8> {
    if bytes == 0 {
        return None;
    }
    let len = round_up_to_page(bytes);
    let p = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if p == libc::MAP_FAILED {
        log::warn!("mmap failed: {}, requested {} bytes", errno::errno(), len);
        None
    } else {
        Some(p as *mut u8)
    }
}

/// Return a mapping previously obtained from [`map`]. `bytes` must be the
/// same logical size passed to `map` (it is rounded up to a page here, the
/// same way `map` rounded it at allocation time, rather than requiring the
/// caller to have remembered the rounded size).
pub fn unmap(region: *mut u8, bytes: usize) {
    if region.is_null() || bytes == 0 {
        return;
    }
    let len = round_up_to_page(bytes);
    let rc = unsafe { libc::munmap(region as *mut libc::c_void, len) };
    if rc != 0 {
        log::warn!(
            "munmap failed: {}, addr {:p}, size {}",
            errno::errno(),
            region,
            len
        );
    }
}
