//! Public API façade: dispatches `allocate`/`release` across the thread
//! cache, the arena, and the oversized direct-`mmap` path.

use std::cell::RefCell;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::arena::{Arena, ArenaError};
use crate::block::{
    align_up, header_at, header_from_payload, offset_of_payload, payload_of, ALIGN, HEADER_SIZE,
    NIL, ORIGIN_OVERSIZED,
};
use crate::page;
use crate::size_class;
use crate::thread_cache::ThreadCache;
use crate::tracker::Tracker;

/// One thread's state for one `Allocator` instance: its cache, and the
/// single arena that cache is paired with (created lazily on first need).
struct Entry {
    owner: usize,
    cache: ThreadCache,
    arena: Option<Arc<Arena>>,
}

/// Thread-local table of `Entry`, keyed by the owning `Allocator`'s unique id
/// (see `Allocator::id`) so that more than one `Allocator` instance (e.g. the
/// process-wide singleton plus ad hoc instances in tests) can each have
/// independent per-thread state without interfering with each other, even if
/// one instance's storage is later reused by an unrelated instance.
struct EntryTable(RefCell<Vec<Entry>>);

impl Drop for EntryTable {
    fn drop(&mut self) {
        // Drain every thread's cache back into its parent arena rather than
        // leaking cached blocks at thread exit.
        for entry in self.0.borrow_mut().iter_mut() {
            if let Some(arena) = &entry.arena {
                entry.cache.drain(arena);
            }
        }
    }
}

thread_local! {
    static THREAD_STATE: EntryTable = EntryTable(RefCell::new(Vec::new()));
}

fn entry_mut(entries: &mut Vec<Entry>, owner: usize) -> &mut Entry {
    if let Some(pos) = entries.iter().position(|e| e.owner == owner) {
        &mut entries[pos]
    } else {
        entries.push(Entry {
            owner,
            cache: ThreadCache::new(),
            arena: None,
        });
        entries.last_mut().unwrap()
    }
}

/// Source of unique `Allocator` ids. Monotonically increasing, so an id is
/// never reused even after the `Allocator` it named is dropped and its
/// storage reused by an unrelated instance — unlike keying by address, which
/// a later instance could collide with on the same stack slot.
static NEXT_ALLOCATOR_ID: AtomicUsize = AtomicUsize::new(1);

/// The allocator façade. Holds the global arena chain and the allocation
/// tracker; explicit enough that tests can build isolated instances with
/// `Allocator::new()` instead of sharing the process-wide singleton.
pub struct Allocator {
    arenas: Mutex<Vec<Arc<Arena>>>,
    tracker: Tracker,
    id: OnceLock<usize>,
}

impl Allocator {
    pub const fn new() -> Self {
        Allocator {
            arenas: Mutex::new(Vec::new()),
            tracker: Tracker::new(),
            id: OnceLock::new(),
        }
    }

    /// Unique id for this instance, assigned lazily on first use so `new` can
    /// stay a `const fn` (a process-wide `static` needs one).
    fn id(&self) -> usize {
        *self.id.get_or_init(|| NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn allocate(&self, size: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        let aligned = align_up(size, ALIGN);
        match size_class::class(aligned) {
            None => self.allocate_oversized(aligned),
            Some(class) => self.allocate_regular(aligned, class),
        }
    }

    pub fn release(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let header = unsafe { header_from_payload(ptr) };
        let (size, origin) = unsafe { ((*header).size, (*header).origin) };

        if origin == ORIGIN_OVERSIZED {
            self.tracker.remove(ptr);
            unsafe { page::unmap(header as *mut u8, HEADER_SIZE + size) };
            return;
        }

        // `origin == ORIGIN_ARENA`: the block lives inside some arena's
        // region, so its size always maps to a regular class.
        let class = size_class::class(size)
            .expect("arena-owned block must have a regular-class size");
        self.release_regular(ptr, class);
        self.tracker.remove(ptr);
    }

    pub fn check_leaks(&self) -> usize {
        self.tracker.check_leaks()
    }

    fn allocate_oversized(&self, size: usize) -> *mut u8 {
        let base = match page::map(HEADER_SIZE + size) {
            Some(b) => b,
            None => return ptr::null_mut(),
        };
        unsafe {
            let h = header_at(base, 0);
            (*h).size = size;
            (*h).free = 0;
            (*h).next = NIL;
            (*h).prev = NIL;
            (*h).phys_prev = NIL;
            (*h).origin = ORIGIN_OVERSIZED;
        }
        let payload = unsafe { payload_of(base, 0) };
        self.tracker.insert(payload, size);
        payload
    }

    fn allocate_regular(&self, size: usize, class: usize) -> *mut u8 {
        let owner = self.id();

        let from_cache_or_arena = THREAD_STATE.with(|table| {
            let mut entries = table.0.borrow_mut();
            let entry = entry_mut(&mut entries, owner);

            if let Some(arena) = entry.arena.clone() {
                if let Some(offset) = entry.cache.pop(&arena, class) {
                    return Some(unsafe { payload_of(arena.base(), offset) });
                }
            }

            let arena = match entry.arena.clone() {
                Some(a) => a,
                None => {
                    let a = Arc::new(Arena::new()?);
                    self.arenas.lock().unwrap().push(a.clone());
                    entry.arena = Some(a.clone());
                    a
                }
            };

            match arena.allocate(size, class) {
                Ok(offset) => Some(unsafe { payload_of(arena.base(), offset) }),
                Err(ArenaError::Exhausted) => None,
            }
        });

        let payload = match from_cache_or_arena {
            Some(p) => p,
            // Either `Arena::new` failed (no memory left to map) or the
            // thread's arena is exhausted. The former is a hard failure;
            // the latter falls back to an oversized mapping per the
            // exhaustion policy chosen in SPEC_FULL.md §4.3.
            None => self.allocate_oversized(size),
        };

        if !payload.is_null() {
            self.tracker.insert(payload, size);
        }
        payload
    }

    fn release_regular(&self, ptr: *mut u8, class: usize) {
        let owner = self.id();

        let handled = THREAD_STATE.with(|table| {
            let mut entries = table.0.borrow_mut();
            let entry = entry_mut(&mut entries, owner);

            if let Some(arena) = &entry.arena {
                if arena.contains(ptr) {
                    let offset = unsafe { offset_of_payload(arena.base(), ptr) };
                    if !entry.cache.push(arena, class, offset) {
                        arena.release(offset);
                    }
                    return true;
                }
            }
            false
        });

        if handled {
            return;
        }

        // The pointer belongs to some other thread's arena (or the calling
        // thread never allocated from its own arena at all). Find the owner
        // in the global chain instead of guessing.
        let arenas = self.arenas.lock().unwrap();
        match arenas.iter().find(|a| a.contains(ptr)) {
            Some(arena) => {
                let offset = unsafe { offset_of_payload(arena.base(), ptr) };
                arena.release(offset);
            }
            None => {
                log::warn!("release of pointer {:p} not owned by any arena", ptr);
            }
        }
    }
}

impl Drop for Allocator {
    fn drop(&mut self) {
        // Best-effort cleanup of this instance's entry on the dropping
        // thread: other threads that touched this allocator keep their own
        // entry (and the arena inside it alive via `Arc`) until they
        // themselves exit, which is harmless since `id` is never reused.
        if let Some(&id) = self.id.get() {
            // `try_with`, not `with`: this runs inside a `Drop` impl, and the
            // thread-local table may already be torn down if the dropping
            // thread is itself exiting. Skipping cleanup in that case is
            // harmless — thread exit already drains every entry in the table.
            let _ = THREAD_STATE.try_with(|table| {
                let mut entries = table.0.borrow_mut();
                if let Some(pos) = entries.iter().position(|e| e.owner == id) {
                    let mut entry = entries.remove(pos);
                    if let Some(arena) = entry.arena.take() {
                        entry.cache.drain(&arena);
                    }
                }
            });
        }
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}
