//! CLI harness: parses positional numeric arguments and drives the benchmark
//! module, printing a side-by-side comparison against the platform allocator.
//!
//! Usage: `bench <size> <iterations> <min_size> <max_size> <threads>`
//!
//! `size` is a fixed allocation size used for the single-threaded run;
//! `min_size`/`max_size` bound the random sizes used for the multi-threaded
//! run. Grounded on the original harness's positional-KB-argument style,
//! extended to cover both run modes this crate's benchmark module supports.

use std::process::ExitCode;

use arenalloc::bench::{self, SizeSpec};

fn usage(program: &str) -> ExitCode {
    eprintln!(
        "Usage: {program} <size> <iterations> <min_size> <max_size> <threads>"
    );
    ExitCode::from(2)
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("bench");

    if args.len() != 6 {
        return usage(program);
    }

    let parsed: Option<(usize, usize, usize, usize, usize)> = (|| {
        Some((
            args[1].parse().ok()?,
            args[2].parse().ok()?,
            args[3].parse().ok()?,
            args[4].parse().ok()?,
            args[5].parse().ok()?,
        ))
    })();

    let (size, iterations, min_size, max_size, threads) = match parsed {
        Some(v) => v,
        None => return usage(program),
    };

    if size == 0 || iterations == 0 || min_size == 0 || max_size < min_size || threads == 0 {
        return usage(program);
    }

    let (custom, system) = bench::compare_single_threaded(iterations, SizeSpec::Fixed(size));
    println!(
        "single-threaded, fixed size {size} bytes: arenalloc {:?} ({} allocations), system {:?} ({} allocations)",
        custom.elapsed, custom.allocations, system.elapsed, system.allocations
    );

    let sizes = SizeSpec::Range {
        min: min_size,
        max: max_size,
    };
    let (custom, system) = bench::compare_multi_threaded(iterations, threads, sizes);
    println!(
        "{threads} threads, sizes {min_size}..={max_size} bytes: arenalloc {:?} ({} allocations), system {:?} ({} allocations)",
        custom.elapsed, custom.allocations, system.elapsed, system.allocations
    );

    let leaks = arenalloc::check_leaks();
    if leaks > 0 {
        eprintln!("warning: {leaks} allocation(s) leaked by the benchmark harness itself");
    }

    ExitCode::SUCCESS
}
