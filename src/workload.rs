//! Workload primitives timed by the runners
//!
//! Each probe is deterministic CPU or memory work. The CPU task never
//! allocates, so it is safe to run in a freshly forked child process.

use crate::error::{ProbeError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::hint::black_box;
use std::time::Instant;

/// Loop iterations in one [`cpu_bound_task`] call
pub const CPU_TASK_ITERATIONS: u64 = 10_000;

/// Nominal cache probe buffer size
pub const CACHE_BUFFER_BYTES: usize = 1024 * 1024;

const PAGE_SIZE: usize = 4096;

/// Fixed-size integer/float loop, no I/O and no allocation
///
/// Returns the accumulated value so callers can keep it observable.
#[inline(never)]
pub fn cpu_bound_task() -> u64 {
    let mut acc: u64 = 0;
    let mut x: f64 = 1.0;
    for i in 0..black_box(CPU_TASK_ITERATIONS) {
        acc = acc.wrapping_add(i.wrapping_mul(i)) ^ (acc >> 7);
        x = x * 1.000_000_1 + (i & 0xff) as f64 * 0.5;
    }
    black_box(acc ^ x.to_bits())
}

/// Run `f` once and return the elapsed wall time in nanoseconds
#[inline]
pub fn time_ns<F: FnOnce() -> R, R>(f: F) -> f64 {
    let start = Instant::now();
    black_box(f());
    start.elapsed().as_nanos() as f64
}

/// Allocate a zeroed vector without aborting on allocation failure
fn try_zeroed<T: Copy + Default>(len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| ProbeError::Allocation {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Buffer and access orders for the cache probes
///
/// Both access patterns write the same number of words into the same buffer,
/// so their timings are directly comparable.
#[derive(Debug)]
pub struct CacheBuffer {
    words: Vec<u64>,
    shuffled: Vec<usize>,
    touches: usize,
}

impl CacheBuffer {
    /// Allocate `bytes` of buffer and a seeded permutation of its word offsets
    ///
    /// `touches` is clamped to the number of words in the buffer.
    pub fn new(bytes: usize, touches: usize, seed: u64) -> Result<Self> {
        let len = (bytes / std::mem::size_of::<u64>()).max(1);
        let words = try_zeroed::<u64>(len)?;

        let mut shuffled = try_zeroed::<usize>(len)?;
        for (i, slot) in shuffled.iter_mut().enumerate() {
            *slot = i;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);

        Ok(Self {
            words,
            shuffled,
            touches: touches.clamp(1, len),
        })
    }

    /// Positions written per pass
    pub fn touches(&self) -> usize {
        self.touches
    }

    /// Buffer size in bytes
    pub fn len_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }

    /// Sequential writes over the first `touches` words
    pub fn cache_friendly_access(&mut self) -> u64 {
        let mut sum = 0u64;
        for word in self.words.iter_mut().take(self.touches) {
            *word = word.wrapping_add(1);
            sum = sum.wrapping_add(*word);
        }
        black_box(sum)
    }

    /// Writes through the first `touches` entries of the shuffled permutation
    pub fn cache_unfriendly_access(&mut self) -> u64 {
        let mut sum = 0u64;
        for &idx in self.shuffled.iter().take(self.touches) {
            let word = &mut self.words[idx];
            *word = word.wrapping_add(1);
            sum = sum.wrapping_add(*word);
        }
        black_box(sum)
    }
}

/// One timed allocation
#[derive(Debug)]
pub struct AllocationSample {
    /// Start address of the allocation
    pub address: usize,
    /// Time to allocate and commit the buffer
    pub duration_ns: f64,
    /// The buffer itself; keep it alive so later probes get fresh addresses
    pub buffer: Vec<u8>,
}

/// Allocate `size` bytes, write one byte per page, and time the whole step
pub fn allocation_probe(size: usize) -> Result<AllocationSample> {
    let size = size.max(1);
    let start = Instant::now();

    let mut buffer: Vec<u8> = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| ProbeError::Allocation { bytes: size })?;
    buffer.resize(size, 0);
    for offset in (0..size).step_by(PAGE_SIZE) {
        buffer[offset] = 0xA5;
    }
    buffer[size - 1] = 0x5A;

    let duration_ns = start.elapsed().as_nanos() as f64;
    Ok(AllocationSample {
        address: black_box(buffer.as_ptr()) as usize,
        duration_ns,
        buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_task_is_deterministic() {
        assert_eq!(cpu_bound_task(), cpu_bound_task());
    }

    #[test]
    fn test_time_ns_is_non_negative() {
        let elapsed = time_ns(cpu_bound_task);
        assert!(elapsed >= 0.0);
    }

    #[test]
    fn test_cache_buffer_sizes() {
        let buf = CacheBuffer::new(CACHE_BUFFER_BYTES, 4096, 7).unwrap();
        assert_eq!(buf.len_bytes(), CACHE_BUFFER_BYTES);
        assert_eq!(buf.touches(), 4096);
    }

    #[test]
    fn test_cache_touches_clamped_to_buffer() {
        let buf = CacheBuffer::new(64, 1000, 7).unwrap();
        assert_eq!(buf.touches(), 8);
    }

    #[test]
    fn test_permutation_covers_every_word() {
        let buf = CacheBuffer::new(8 * 256, 16, 42).unwrap();
        let mut seen = buf.shuffled.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..256).collect::<Vec<_>>());
    }

    #[test]
    fn test_permutation_is_seeded() {
        let a = CacheBuffer::new(8 * 512, 16, 99).unwrap();
        let b = CacheBuffer::new(8 * 512, 16, 99).unwrap();
        assert_eq!(a.shuffled, b.shuffled);
    }

    #[test]
    fn test_both_patterns_write_same_count() {
        let mut buf = CacheBuffer::new(8 * 1024, 100, 3).unwrap();
        buf.cache_friendly_access();
        buf.cache_unfriendly_access();
        let total: u64 = buf.words.iter().sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_allocation_probe_commits_buffer() {
        let sample = allocation_probe(3 * PAGE_SIZE + 17).unwrap();
        assert_eq!(sample.buffer.len(), 3 * PAGE_SIZE + 17);
        assert_eq!(sample.buffer[PAGE_SIZE], 0xA5);
        assert_eq!(sample.address, sample.buffer.as_ptr() as usize);
        assert!(sample.duration_ns >= 0.0);
    }

    #[test]
    fn test_allocation_probe_zero_size_still_allocates() {
        let sample = allocation_probe(0).unwrap();
        assert_eq!(sample.buffer.len(), 1);
    }

    #[test]
    fn test_allocation_probe_reports_failure() {
        let err = allocation_probe(usize::MAX).unwrap_err();
        assert!(matches!(err, ProbeError::Allocation { .. }));
    }
}
