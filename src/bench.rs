//! Timed allocation/release loops comparing this crate against the platform
//! allocator. Grounded on the original C harness's `perf_cmp`-style timing
//! loops, reworked around `Instant` and `Layout`-based `System` calls instead
//! of `clock_gettime`/raw `malloc`/`free`.

use std::alloc::{GlobalAlloc, Layout, System};
use std::thread;
use std::time::{Duration, Instant};

use crate::Allocator;

/// A size to allocate on each iteration of a run: either fixed, or drawn
/// uniformly from `[min, max]` using a small xorshift generator (no extra
/// dependency on a random-number crate for a benchmark harness).
#[derive(Clone, Copy)]
pub enum SizeSpec {
    Fixed(usize),
    Range { min: usize, max: usize },
}

impl SizeSpec {
    fn next(&self, state: &mut u64) -> usize {
        match *self {
            SizeSpec::Fixed(n) => n,
            SizeSpec::Range { min, max } => {
                // xorshift64*, good enough for spreading allocation sizes.
                *state ^= *state << 13;
                *state ^= *state >> 7;
                *state ^= *state << 17;
                let span = (max - min + 1) as u64;
                min + (*state % span) as usize
            }
        }
    }
}

/// Result of one timed run: how many allocations completed and how long it took.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub allocations: usize,
    pub elapsed: Duration,
}

fn run_custom(alloc: &Allocator, iterations: usize, sizes: SizeSpec, seed: u64) -> RunReport {
    let mut state = seed | 1;
    let start = Instant::now();
    for _ in 0..iterations {
        let size = sizes.next(&mut state);
        let ptr = alloc.allocate(size);
        if !ptr.is_null() {
            alloc.release(ptr);
        }
    }
    RunReport {
        allocations: iterations,
        elapsed: start.elapsed(),
    }
}

fn run_system(iterations: usize, sizes: SizeSpec, seed: u64) -> RunReport {
    let mut state = seed | 1;
    let start = Instant::now();
    for _ in 0..iterations {
        let size = sizes.next(&mut state).max(1);
        // SAFETY: `size` is nonzero and the allocator's fixed alignment (16)
        // satisfies `Layout`'s alignment requirements for any byte size.
        unsafe {
            let layout = Layout::from_size_align_unchecked(size, 16);
            let ptr = System.alloc(layout);
            if !ptr.is_null() {
                System.dealloc(ptr, layout);
            }
        }
    }
    RunReport {
        allocations: iterations,
        elapsed: start.elapsed(),
    }
}

/// Run `iterations` single-threaded allocate/release cycles against both
/// allocators and return their reports as `(custom, system)`.
pub fn compare_single_threaded(iterations: usize, sizes: SizeSpec) -> (RunReport, RunReport) {
    let alloc = Allocator::new();
    let custom = run_custom(&alloc, iterations, sizes, 0x2545_f491_4f6c_dd1d);
    let system = run_system(iterations, sizes, 0x9e37_79b9_7f4a_7c15);
    (custom, system)
}

/// Run `iterations` allocate/release cycles split evenly across `threads`
/// threads, for both allocators, returning `(custom, system)`. Matches the
/// original harness's per-thread even split of the total iteration count.
pub fn compare_multi_threaded(
    iterations: usize,
    threads: usize,
    sizes: SizeSpec,
) -> (RunReport, RunReport) {
    let threads = threads.max(1);
    let per_thread = iterations / threads;

    let alloc = std::sync::Arc::new(Allocator::new());
    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let alloc = std::sync::Arc::clone(&alloc);
            let seed = 0x2545_f491_4f6c_dd1d ^ (i as u64).wrapping_mul(0x9e37_79b9);
            thread::spawn(move || run_custom(&alloc, per_thread, sizes, seed))
        })
        .collect();
    for h in handles {
        h.join().expect("benchmark thread panicked");
    }
    let custom = RunReport {
        allocations: per_thread * threads,
        elapsed: start.elapsed(),
    };

    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let seed = 0x9e37_79b9_7f4a_7c15 ^ (i as u64).wrapping_mul(0x2545_f491);
            thread::spawn(move || run_system(per_thread, sizes, seed))
        })
        .collect();
    for h in handles {
        h.join().expect("benchmark thread panicked");
    }
    let system = RunReport {
        allocations: per_thread * threads,
        elapsed: start.elapsed(),
    };

    (custom, system)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_threaded_runs_complete() {
        let (custom, system) = compare_single_threaded(100, SizeSpec::Fixed(64));
        assert_eq!(custom.allocations, 100);
        assert_eq!(system.allocations, 100);
    }

    #[test]
    fn multi_threaded_runs_complete() {
        let (custom, system) = compare_multi_threaded(400, 4, SizeSpec::Range { min: 8, max: 4096 });
        assert_eq!(custom.allocations, 400);
        assert_eq!(system.allocations, 400);
    }
}
