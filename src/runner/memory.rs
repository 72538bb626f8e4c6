//! Allocation address/timing entropy
//!
//! The runner records a trace of heap allocations, then tries a list of
//! named estimation strategies in order. The first one whose entropy reaches
//! the usability threshold wins; otherwise the best value seen is reported.

use super::{Category, SampleCollector, MAX_PREALLOCATED_SAMPLES};
use crate::config::ProbeConfig;
use crate::error::Result;
use crate::stats::shannon_entropy_with_bins;
use crate::workload::allocation_probe;
use std::fmt;
use tracing::{debug, warn};

const PROBE_SIZE_STEP: usize = 1024;
const PROBE_SIZE_CYCLE: usize = 16;

/// Addresses and durations of successive allocations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationTrace {
    pub addresses: Vec<usize>,
    pub durations_ns: Vec<f64>,
    /// Probes that failed to allocate
    pub failed: usize,
}

impl AllocationTrace {
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Way of turning an allocation trace into an entropy input sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyStrategy {
    /// Differences between consecutive addresses
    AddressDeltas,
    /// Time spent in each allocation
    AllocationTiming,
    /// Addresses as-is
    RawAddresses,
}

impl EntropyStrategy {
    /// Default order: deltas first, raw addresses last
    pub const CASCADE: [EntropyStrategy; 3] = [
        EntropyStrategy::AddressDeltas,
        EntropyStrategy::AllocationTiming,
        EntropyStrategy::RawAddresses,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntropyStrategy::AddressDeltas => "address_deltas",
            EntropyStrategy::AllocationTiming => "allocation_timing",
            EntropyStrategy::RawAddresses => "raw_addresses",
        }
    }

    /// Sequence this strategy feeds to the histogram
    pub fn derive(self, trace: &AllocationTrace) -> Vec<f64> {
        match self {
            EntropyStrategy::AddressDeltas => trace
                .addresses
                .windows(2)
                .map(|pair| pair[1] as f64 - pair[0] as f64)
                .collect(),
            EntropyStrategy::AllocationTiming => trace.durations_ns.clone(),
            EntropyStrategy::RawAddresses => {
                trace.addresses.iter().map(|&addr| addr as f64).collect()
            }
        }
    }
}

impl fmt::Display for EntropyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Entropy picked by the cascade
#[derive(Debug, Clone, PartialEq)]
pub struct EntropyEstimate {
    /// Entropy in bits
    pub value: f64,
    /// Strategy that produced `value`, `None` when no strategy was tried
    pub strategy: Option<EntropyStrategy>,
    /// Whether `value` reached the usability threshold
    pub usable: bool,
    /// Every strategy tried, in order, with its entropy
    pub attempts: Vec<(EntropyStrategy, f64)>,
}

impl EntropyEstimate {
    /// Zero entropy, no strategy tried
    pub fn empty() -> Self {
        Self {
            value: 0.0,
            strategy: None,
            usable: false,
            attempts: Vec::new(),
        }
    }
}

/// Try `strategies` in order and keep the first usable entropy
///
/// # Example
/// ```
/// use vmprobe::runner::{estimate_entropy, AllocationTrace, EntropyStrategy};
///
/// let trace = AllocationTrace {
///     addresses: vec![0x1000, 0x2000, 0x3000, 0x4000],
///     durations_ns: vec![10.0, 20.0, 10.0, 20.0],
///     failed: 0,
/// };
/// let estimate = estimate_entropy(&trace, &EntropyStrategy::CASCADE, 1.0, 20);
/// // Constant deltas carry no entropy, so timing wins with one bit
/// assert_eq!(estimate.strategy, Some(EntropyStrategy::AllocationTiming));
/// assert!(estimate.usable);
/// ```
pub fn estimate_entropy(
    trace: &AllocationTrace,
    strategies: &[EntropyStrategy],
    threshold: f64,
    bins: usize,
) -> EntropyEstimate {
    let mut estimate = EntropyEstimate::empty();

    for &strategy in strategies {
        let value = shannon_entropy_with_bins(&strategy.derive(trace), bins);
        debug!("Entropy strategy {}: {:.4} bits", strategy, value);
        estimate.attempts.push((strategy, value));

        if value >= threshold {
            estimate.value = value;
            estimate.strategy = Some(strategy);
            estimate.usable = true;
            return estimate;
        }

        if estimate.strategy.is_none() || value > estimate.value {
            estimate.value = value;
            estimate.strategy = Some(strategy);
        }
    }

    if !strategies.is_empty() && !trace.is_empty() {
        warn!(
            "No entropy strategy reached {:.2} bits; reporting best value {:.4}",
            threshold, estimate.value
        );
    }
    estimate
}

/// Allocates a run of buffers and estimates how unpredictable they are
#[derive(Debug, Clone)]
pub struct MemoryEntropyRunner {
    probes: usize,
    bins: usize,
    threshold: f64,
    strategies: Vec<EntropyStrategy>,
}

impl MemoryEntropyRunner {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            probes: config.allocation_probes,
            bins: config.histogram_bins,
            threshold: config.min_usable_entropy,
            strategies: EntropyStrategy::CASCADE.to_vec(),
        }
    }

    /// Replace the strategy order
    pub fn with_strategies(mut self, strategies: Vec<EntropyStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Size of probe `i`: 1 KiB, 2 KiB, ... 16 KiB, then around again
    pub fn probe_size(i: usize) -> usize {
        PROBE_SIZE_STEP * (1 + i % PROBE_SIZE_CYCLE)
    }

    /// Allocate every probe, holding all buffers until the trace is done
    pub fn collect_trace(&self) -> Result<AllocationTrace> {
        let mut durations = SampleCollector::new(Category::MemoryAllocation, self.probes);
        let reserved = self.probes.min(MAX_PREALLOCATED_SAMPLES);
        let mut addresses = Vec::with_capacity(reserved);
        let mut live = Vec::with_capacity(reserved);

        durations.begin_sampling()?;
        for i in 0..self.probes {
            match allocation_probe(Self::probe_size(i)) {
                Ok(sample) => {
                    addresses.push(sample.address);
                    durations.record(sample.duration_ns)?;
                    live.push(sample.buffer);
                }
                Err(err) => {
                    warn!("Allocation probe {} failed, ending early: {}", i, err);
                    durations.drop_sample()?;
                    break;
                }
            }
        }

        let durations_ns = durations.samples().to_vec();
        let summary = durations.finish()?;
        drop(live);

        Ok(AllocationTrace {
            addresses,
            durations_ns,
            failed: summary.dropped,
        })
    }

    pub fn estimate(&self, trace: &AllocationTrace) -> EntropyEstimate {
        estimate_entropy(trace, &self.strategies, self.threshold, self.bins)
    }

    pub fn run(&self) -> Result<EntropyEstimate> {
        let trace = self.collect_trace()?;
        Ok(self.estimate(&trace))
    }
}
