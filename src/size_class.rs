//! Pure mapping from a requested byte count to a size class.
//!
//! Ten fixed payload sizes, spaced by doubling from 8 to 4096 bytes. Anything
//! larger falls off the end of the table and is handled by the façade's
//! oversized (direct-`mmap`) path instead.

/// Number of regular (non-oversized) size classes.
pub const N_CLASSES: usize = 10;

/// Canonical payload sizes, ascending.
pub const CLASSES: [usize; N_CLASSES] = [8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096];

/// Largest size a regular class can satisfy; anything above this is oversized.
pub const MAX_CLASS_SIZE: usize = CLASSES[N_CLASSES - 1];

/// Smallest class index whose payload size is `>= size`, or `None` if `size`
/// exceeds every class (the caller's cue to take the oversized path).
///
/// A linear scan over ten entries is as fast as anything fancier here; a
/// real constant-time version would do a `leading_zeros`-based bucket lookup,
/// but the straight-line scan is what the distilled table describes and
/// there is no hot loop in this crate that would notice the difference.
pub fn class(size: usize) -> Option<usize> {
    CLASSES.iter().position(|&c| size <= c)
}

/// Arena-internal classification used for free-list indexing: the regular
/// class when one fits, otherwise the arena-local overflow bucket (index
/// `N_CLASSES`). Distinct from `class`, which reports "oversized" as "no
/// class at all" for the façade to route to direct `mmap`. A post-split
/// remainder, or the arena's initial whole-region block, commonly lands in
/// the overflow bucket even though the *allocation* it eventually serves
/// will be a regular class.
pub fn class_or_overflow(size: usize) -> usize {
    class(size).unwrap_or(N_CLASSES)
}
