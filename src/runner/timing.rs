//! Basic and consecutive CPU timing

use super::{Category, CategoryResult, SampleCollector};
use crate::config::ProbeConfig;
use crate::error::Result;
use crate::workload::{cpu_bound_task, time_ns};
use std::hint::black_box;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingMode {
    /// One `cpu_bound_task` per sample
    Basic,
    /// Two back-to-back `cpu_bound_task` calls per sample
    Consecutive,
}

impl TimingMode {
    fn category(self) -> Category {
        match self {
            TimingMode::Basic => Category::TimingBasic,
            TimingMode::Consecutive => Category::TimingConsecutive,
        }
    }
}

/// Times the CPU workload `iterations` times
///
/// # Example
/// ```
/// use vmprobe::runner::{TimingMode, TimingRunner};
///
/// let result = TimingRunner::new(TimingMode::Basic, 5, 0).run().unwrap();
/// assert_eq!(result.samples, 5);
/// ```
#[derive(Debug, Clone)]
pub struct TimingRunner {
    mode: TimingMode,
    iterations: usize,
    warmup: usize,
}

impl TimingRunner {
    pub fn new(mode: TimingMode, iterations: usize, warmup: usize) -> Self {
        Self {
            mode,
            iterations,
            warmup,
        }
    }

    pub fn basic(config: &ProbeConfig) -> Self {
        Self::new(
            TimingMode::Basic,
            config.iterations,
            config.warmup_iterations,
        )
    }

    pub fn consecutive(config: &ProbeConfig) -> Self {
        Self::new(
            TimingMode::Consecutive,
            config.iterations,
            config.warmup_iterations,
        )
    }

    pub fn category(&self) -> Category {
        self.mode.category()
    }

    pub fn run(&self) -> Result<CategoryResult> {
        let mut collector = SampleCollector::new(self.category(), self.iterations);

        if self.iterations > 0 && self.warmup > 0 {
            collector.warm_up(self.warmup, || {
                black_box(cpu_bound_task());
            })?;
        }

        collector.begin_sampling()?;
        for _ in 0..self.iterations {
            let elapsed = match self.mode {
                TimingMode::Basic => time_ns(cpu_bound_task),
                TimingMode::Consecutive => time_ns(|| {
                    let first = cpu_bound_task();
                    let second = cpu_bound_task();
                    first ^ second
                }),
            };
            collector.record(elapsed)?;
        }

        collector.finish()
    }
}
