// Benchmark runners
//
// Each runner owns its workload and buffers, collects one or more sample
// sequences, and reduces them to statistics. Sampling goes through
// `SampleCollector`, which enforces the lifecycle
//
//   Idle -> Warming (optional) -> Sampling -> Aggregating -> Done
//
// A failed sample is dropped and counted, never zero-filled. There are no
// retries. System call failures are logged at the runner and skipped.

mod cache;
mod memory;
mod scheduling;
mod timing;

pub use cache::{CacheResult, CacheRunner, NEUTRAL_ACCESS_RATIO, NEUTRAL_MISS_RATIO};
pub use memory::{
    estimate_entropy, AllocationTrace, EntropyEstimate, EntropyStrategy, MemoryEntropyRunner,
};
pub use scheduling::{ChildExit, ProcessSchedulingRunner, ThreadSchedulingRunner};
pub use timing::{TimingMode, TimingRunner};

use crate::error::{ProbeError, Result};
use crate::stats::Statistics;
use std::fmt;
use tracing::debug;

/// Measurement category; the name doubles as the report key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    TimingBasic,
    TimingConsecutive,
    SchedulingThread,
    SchedulingMultiproc,
    CacheFriendly,
    CacheUnfriendly,
    MemoryAllocation,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::TimingBasic => "TIMING_BASIC",
            Category::TimingConsecutive => "TIMING_CONSECUTIVE",
            Category::SchedulingThread => "SCHEDULING_THREAD",
            Category::SchedulingMultiproc => "SCHEDULING_MULTIPROC",
            Category::CacheFriendly => "CACHE_FRIENDLY",
            Category::CacheUnfriendly => "CACHE_UNFRIENDLY",
            Category::MemoryAllocation => "MEMORY_ALLOCATION",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of one sample collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Warming,
    Sampling,
    Aggregating,
    Done,
}

impl RunnerState {
    fn name(self) -> &'static str {
        match self {
            RunnerState::Idle => "Idle",
            RunnerState::Warming => "Warming",
            RunnerState::Sampling => "Sampling",
            RunnerState::Aggregating => "Aggregating",
            RunnerState::Done => "Done",
        }
    }

    fn can_enter(self, next: RunnerState) -> bool {
        matches!(
            (self, next),
            (RunnerState::Idle, RunnerState::Warming)
                | (RunnerState::Idle, RunnerState::Sampling)
                | (RunnerState::Warming, RunnerState::Sampling)
                | (RunnerState::Sampling, RunnerState::Aggregating)
                | (RunnerState::Aggregating, RunnerState::Done)
        )
    }
}

/// Statistics for one category plus collection counts
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub category: Category,
    pub stats: Statistics,
    /// Samples that made it into `stats`
    pub samples: usize,
    /// Samples dropped because of worker or system call failures
    pub dropped: usize,
}

impl CategoryResult {
    /// All-zero result for a category that could not be measured
    pub fn empty(category: Category) -> Self {
        Self {
            category,
            stats: Statistics::default(),
            samples: 0,
            dropped: 0,
        }
    }
}

/// Samples reserved up front; larger runs grow the buffer as they record
pub const MAX_PREALLOCATED_SAMPLES: usize = 1 << 16;

/// Owns one sample sequence through the runner lifecycle
#[derive(Debug)]
pub struct SampleCollector {
    category: Category,
    state: RunnerState,
    samples: Vec<f64>,
    dropped: usize,
}

impl SampleCollector {
    pub fn new(category: Category, capacity: usize) -> Self {
        Self {
            category,
            state: RunnerState::Idle,
            samples: Vec::with_capacity(capacity.min(MAX_PREALLOCATED_SAMPLES)),
            dropped: 0,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    fn transition(&mut self, next: RunnerState) -> Result<()> {
        if !self.state.can_enter(next) {
            return Err(ProbeError::InvalidState {
                from: self.state.name(),
                to: next.name(),
            });
        }
        debug!("{}: {} -> {}", self.category, self.state.name(), next.name());
        self.state = next;
        Ok(())
    }

    /// Run `f` `iterations` times without recording anything
    pub fn warm_up<F: FnMut()>(&mut self, iterations: usize, mut f: F) -> Result<()> {
        self.transition(RunnerState::Warming)?;
        for _ in 0..iterations {
            f();
        }
        Ok(())
    }

    pub fn begin_sampling(&mut self) -> Result<()> {
        self.transition(RunnerState::Sampling)
    }

    /// Record one sample; only valid while sampling
    pub fn record(&mut self, sample: f64) -> Result<()> {
        self.require_sampling()?;
        self.samples.push(sample);
        Ok(())
    }

    /// Count a failed sample; nothing is recorded in its place
    pub fn drop_sample(&mut self) -> Result<()> {
        self.require_sampling()?;
        self.dropped += 1;
        Ok(())
    }

    fn require_sampling(&self) -> Result<()> {
        if self.state == RunnerState::Sampling {
            Ok(())
        } else {
            Err(ProbeError::InvalidState {
                from: self.state.name(),
                to: RunnerState::Sampling.name(),
            })
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Reduce the collected samples and close the lifecycle
    pub fn finish(mut self) -> Result<CategoryResult> {
        self.transition(RunnerState::Aggregating)?;
        let stats = Statistics::from_samples(&self.samples);
        self.transition(RunnerState::Done)?;

        debug!(
            "{}: {} samples, {} dropped, mean {:.1} ns",
            self.category,
            self.samples.len(),
            self.dropped,
            stats.mean
        );

        Ok(CategoryResult {
            category: self.category,
            stats,
            samples: self.samples.len(),
            dropped: self.dropped,
        })
    }
}
