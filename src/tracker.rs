//! Global record of live user pointers, for leak reporting and
//! untracked-free diagnostics.
//!
//! Tracker nodes are ordinary `Box`es, i.e. come from the platform allocator
//! rather than from `allocate` — deliberately, to avoid recursing back into
//! this crate's own allocation path while bookkeeping it.

use std::sync::Mutex;

struct Node {
    ptr: usize,
    size: usize,
    next: Option<Box<Node>>,
}

pub struct Tracker {
    head: Mutex<Option<Box<Node>>>,
}

impl Tracker {
    pub const fn new() -> Self {
        Tracker {
            head: Mutex::new(None),
        }
    }

    pub fn insert(&self, ptr: *mut u8, size: usize) {
        let mut head = self.head.lock().unwrap();
        let node = Box::new(Node {
            ptr: ptr as usize,
            size,
            next: head.take(),
        });
        *head = Some(node);
    }

    /// Remove the record for `ptr`. Logs a diagnostic and does nothing else
    /// if `ptr` is not tracked.
    pub fn remove(&self, ptr: *mut u8) {
        let target = ptr as usize;
        let mut head = self.head.lock().unwrap();
        let mut cur = &mut *head;
        loop {
            match cur {
                None => {
                    log::warn!("release of untracked pointer {:p}", ptr);
                    return;
                }
                Some(node) if node.ptr == target => {
                    *cur = node.next.take();
                    return;
                }
                Some(node) => {
                    cur = &mut node.next;
                }
            }
        }
    }

    /// Emit one line per live allocation to stderr and return how many were
    /// found. Format is part of the crate's external contract, not a `log`
    /// diagnostic, so it is written directly rather than through `log::warn!`.
    pub fn check_leaks(&self) -> usize {
        let head = self.head.lock().unwrap();
        let mut count = 0;
        let mut cur = head.as_deref();
        while let Some(node) = cur {
            eprintln!(
                "Memory leak detected: pointer {:#x} of size {} bytes",
                node.ptr, node.size
            );
            count += 1;
            cur = node.next.as_deref();
        }
        count
    }

    #[cfg(test)]
    pub fn contains(&self, ptr: *mut u8) -> bool {
        let target = ptr as usize;
        let head = self.head.lock().unwrap();
        let mut cur = head.as_deref();
        while let Some(node) = cur {
            if node.ptr == target {
                return true;
            }
            cur = node.next.as_deref();
        }
        false
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}
