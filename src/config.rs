//! Probe configuration
//!
//! One struct carries every tunable the runners read. Only `iterations` is
//! reachable from the command line; the rest are policy constants that tests
//! and embedders can override.

use crate::error::{ProbeError, Result};
use crate::index::IndexScale;
use crate::stats::HISTOGRAM_BINS;
use crate::workload::CACHE_BUFFER_BYTES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default iteration count when none is given
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Configuration for a measurement run
///
/// # Example
/// ```
/// use vmprobe::config::ProbeConfig;
///
/// let config = ProbeConfig::with_iterations(200);
/// assert_eq!(config.thread_batches(), 20);
/// assert_eq!(config.process_batches(), 20);
/// assert_eq!(config.cache_iterations(), 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Samples taken by the timing runners; scales every other runner
    pub iterations: usize,

    /// Untimed workload calls before sampling starts
    pub warmup_iterations: usize,

    /// Concurrent workers per scheduling batch (threads or processes)
    pub worker_count: usize,

    /// Scheduling batches = iterations / divisor
    pub batch_divisor: usize,

    /// Upper bound on multiprocess batches (process creation is expensive)
    pub process_batch_cap: usize,

    /// Upper bound on cache iterations per access pattern
    pub cache_iteration_cap: usize,

    /// Cache probe buffer size in bytes
    pub cache_buffer_bytes: usize,

    /// Positions written per cache access pass (same for both patterns)
    pub cache_touches: usize,

    /// Allocation probes taken by the memory entropy runner
    pub allocation_probes: usize,

    /// Histogram bins for every entropy value in the report
    pub histogram_bins: usize,

    /// Entropy (bits) below which the next estimation strategy is tried
    pub min_usable_entropy: f64,

    /// Longest wait for one scheduling batch before stragglers are dropped
    #[serde(with = "duration_ms")]
    pub worker_timeout: Duration,

    /// Seed for the cache-unfriendly access permutation
    pub shuffle_seed: u64,

    /// Composite index formula
    pub index_scale: IndexScale,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            warmup_iterations: 10,
            worker_count: 4,
            batch_divisor: 10,
            process_batch_cap: 100,
            cache_iteration_cap: 100,
            cache_buffer_bytes: CACHE_BUFFER_BYTES,
            cache_touches: 16 * 1024,
            allocation_probes: 1000,
            histogram_bins: HISTOGRAM_BINS,
            min_usable_entropy: 1.0,
            worker_timeout: Duration::from_secs(10),
            shuffle_seed: 0x5eed_cafe,
            index_scale: IndexScale::Ratio,
        }
    }
}

impl ProbeConfig {
    /// Default configuration with a custom iteration count
    pub fn with_iterations(iterations: usize) -> Self {
        Self {
            iterations,
            ..Self::default()
        }
    }

    /// Small, fast configuration for smoke tests
    pub fn quick() -> Self {
        Self {
            iterations: 20,
            warmup_iterations: 1,
            cache_buffer_bytes: 64 * 1024,
            cache_touches: 1024,
            allocation_probes: 100,
            ..Self::default()
        }
    }

    /// Thread scheduling batches (at least one when sampling is enabled)
    pub fn thread_batches(&self) -> usize {
        self.scaled_batches()
    }

    /// Multiprocess scheduling batches, capped at `process_batch_cap`
    pub fn process_batches(&self) -> usize {
        self.scaled_batches().min(self.process_batch_cap)
    }

    /// Iterations per cache access pattern, capped at `cache_iteration_cap`
    pub fn cache_iterations(&self) -> usize {
        self.iterations.min(self.cache_iteration_cap)
    }

    fn scaled_batches(&self) -> usize {
        if self.iterations == 0 {
            return 0;
        }
        (self.iterations / self.batch_divisor.max(1)).max(1)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(ProbeError::InvalidConfig(
                "worker_count must be >= 1".to_string(),
            ));
        }

        if self.batch_divisor == 0 {
            return Err(ProbeError::InvalidConfig(
                "batch_divisor must be >= 1".to_string(),
            ));
        }

        if self.cache_buffer_bytes < std::mem::size_of::<u64>() {
            return Err(ProbeError::InvalidConfig(format!(
                "cache_buffer_bytes must hold at least one word, got {}",
                self.cache_buffer_bytes
            )));
        }

        let words = self.cache_buffer_bytes / std::mem::size_of::<u64>();
        if self.cache_touches == 0 || self.cache_touches > words {
            return Err(ProbeError::InvalidConfig(format!(
                "cache_touches must be in [1, {}], got {}",
                words, self.cache_touches
            )));
        }

        if self.histogram_bins == 0 {
            return Err(ProbeError::InvalidConfig(
                "histogram_bins must be >= 1".to_string(),
            ));
        }

        if !self.min_usable_entropy.is_finite() || self.min_usable_entropy < 0.0 {
            return Err(ProbeError::InvalidConfig(format!(
                "min_usable_entropy must be a non-negative number, got {}",
                self.min_usable_entropy
            )));
        }

        if self.worker_timeout.is_zero() {
            return Err(ProbeError::InvalidConfig(
                "worker_timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProbeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.iterations, 1000);
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.histogram_bins, HISTOGRAM_BINS);
    }

    #[test]
    fn test_quick_config_is_valid() {
        assert!(ProbeConfig::quick().validate().is_ok());
    }

    #[test]
    fn test_batches_follow_iterations() {
        let config = ProbeConfig::with_iterations(1000);
        assert_eq!(config.thread_batches(), 100);
        assert_eq!(config.process_batches(), 100);
        assert_eq!(config.cache_iterations(), 100);
    }

    #[test]
    fn test_process_batches_are_capped() {
        let config = ProbeConfig::with_iterations(50_000);
        assert_eq!(config.thread_batches(), 5000);
        assert_eq!(config.process_batches(), 100);
    }

    #[test]
    fn test_small_iteration_count_keeps_one_batch() {
        let config = ProbeConfig::with_iterations(3);
        assert_eq!(config.thread_batches(), 1);
        assert_eq!(config.process_batches(), 1);
        assert_eq!(config.cache_iterations(), 3);
    }

    #[test]
    fn test_zero_iterations_means_no_batches() {
        let config = ProbeConfig::with_iterations(0);
        assert_eq!(config.thread_batches(), 0);
        assert_eq!(config.process_batches(), 0);
        assert_eq!(config.cache_iterations(), 0);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = ProbeConfig {
            worker_count: 0,
            ..ProbeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_touch_count() {
        let config = ProbeConfig {
            cache_buffer_bytes: 1024,
            cache_touches: 1024,
            ..ProbeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_entropy_threshold() {
        let config = ProbeConfig {
            min_usable_entropy: -0.5,
            ..ProbeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serializes_timeout_as_millis() {
        let json = serde_json::to_value(ProbeConfig::default()).unwrap();
        assert_eq!(json["worker_timeout"], 10_000);
        assert_eq!(json["index_scale"], "ratio");
    }

    #[test]
    fn test_config_reads_back_from_json() {
        let config = ProbeConfig {
            worker_timeout: Duration::from_millis(2500),
            index_scale: IndexScale::Log10,
            ..ProbeConfig::quick()
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: ProbeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.worker_timeout, Duration::from_millis(2500));
        assert_eq!(parsed.index_scale, IndexScale::Log10);
        assert_eq!(parsed.iterations, config.iterations);
        assert_eq!(parsed.cache_buffer_bytes, config.cache_buffer_bytes);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_unknown_index_scale() {
        let mut json = serde_json::to_value(ProbeConfig::default()).unwrap();
        json["index_scale"] = serde_json::Value::from("cubic");
        assert!(serde_json::from_value::<ProbeConfig>(json).is_err());
    }
}
