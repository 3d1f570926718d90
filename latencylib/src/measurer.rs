use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use log::debug;
use crate::buffer::{GenericBuffer, MemoryBuffer};
use crate::pattern::AccessPattern;

/// Every measurement folds its accumulator in here
///
/// The walk XORs together every value it reads. Publishing that value somewhere the compiler
/// can't see the end of means it can't prove the reads are unused and delete them
pub static SINK: AtomicU64 = AtomicU64::new(0);

/// The outcome of one timed measurement
#[derive(Debug, Copy, Clone)]
pub struct Measurement {
    /// Average time per read, always finite and positive
    pub ns_per_access: f64,
    pub loop_count: u64,
    pub total_accesses: u64,
    pub elapsed: Duration,
    /// XOR of every value read in the timed region
    pub checksum: u64,
}

/// Walks a buffer once at the pattern's stride, returning the XOR of every value read
///
/// # Arguments
///
/// * `buffer`: The buffer to read, at least `pattern.element_count()` long
/// * `pattern`: The stride and length of the walk
///
/// returns: u64
#[inline(always)]
pub fn walk<B: MemoryBuffer + ?Sized>(buffer: &B, pattern: &AccessPattern) -> u64 {
    let stride = pattern.stride_elements();
    let end = pattern.element_count();
    let mut acc = 0u64;
    let mut i = 0;
    while i < end {
        acc ^= buffer.read(i);
        i += stride;
    }
    acc
}

/// Times repeated walks over a buffer and derives the average time per read
///
/// The buffer is walked `pattern.loop_count(min_accesses)` times, so at least `min_accesses`
/// reads are timed however small the buffer is. With `warmup` set, one untimed walk happens
/// first to fault in pages and fill the TLB
///
/// Nothing inside the timed region allocates, logs or yields
///
/// # Arguments
///
/// * `buffer`: The buffer under test
/// * `pattern`: The walk, whose element count must not exceed the buffer length
/// * `min_accesses`: The floor on the number of timed reads
/// * `warmup`: Whether to do an untimed walk first
///
/// returns: Measurement
pub fn measure<B: MemoryBuffer + ?Sized>(
    buffer: &B,
    pattern: &AccessPattern,
    min_accesses: u64,
    warmup: bool,
) -> Measurement {
    assert!(
        pattern.element_count() <= buffer.len(),
        "walk of {} elements over a buffer of {}",
        pattern.element_count(),
        buffer.len()
    );
    if warmup {
        SINK.fetch_xor(black_box(walk(buffer, pattern)), Ordering::Relaxed);
    }
    let loop_count = pattern.loop_count(min_accesses);
    let total_accesses = pattern.total_accesses(min_accesses);

    let start = Instant::now();
    let mut acc = 0u64;
    let mut l = 0;
    while l < loop_count {
        // Hiding the buffer each time stops the walk being hoisted out of the loop
        acc ^= walk(black_box(buffer), pattern);
        l += 1;
    }
    let elapsed = start.elapsed();

    SINK.fetch_xor(black_box(acc), Ordering::Relaxed);
    // A clock coarser than the whole loop would report zero
    let elapsed_ns = elapsed.as_nanos().max(1) as f64;
    let ns_per_access = elapsed_ns / total_accesses as f64;
    debug!(
        "{} x {} elements, stride {}: {loop_count} loops, {total_accesses} reads in {elapsed:?} ({ns_per_access:.3} ns/read)",
        buffer.kind(),
        pattern.element_count(),
        pattern.stride_elements()
    );
    Measurement {
        ns_per_access,
        loop_count,
        total_accesses,
        elapsed,
        checksum: acc,
    }
}

/// Measures a GenericBuffer, branching on the layout once so the timed loop is monomorphised
pub fn measure_buffer(
    buffer: &GenericBuffer,
    pattern: &AccessPattern,
    min_accesses: u64,
    warmup: bool,
) -> Measurement {
    match buffer {
        GenericBuffer::Contiguous(b) => measure(b, pattern, min_accesses, warmup),
        GenericBuffer::Indirect(b) => measure(b, pattern, min_accesses, warmup),
    }
}
