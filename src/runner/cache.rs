//! Cache-friendly vs cache-unfriendly access timing

use super::{Category, CategoryResult, SampleCollector};
use crate::config::ProbeConfig;
use crate::error::Result;
use crate::workload::{time_ns, CacheBuffer};
use tracing::warn;

/// Ratio reported when the cache probe cannot be measured
pub const NEUTRAL_ACCESS_RATIO: f64 = 1.0;
/// Miss ratio reported when the cache probe cannot be measured
pub const NEUTRAL_MISS_RATIO: f64 = 0.0;

/// Both access patterns plus the derived ratios
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult {
    pub friendly: CategoryResult,
    pub unfriendly: CategoryResult,
    /// `unfriendly_mean / friendly_mean`
    pub access_ratio: f64,
    /// `(unfriendly_mean - friendly_mean) / friendly_mean`
    pub miss_ratio: f64,
}

impl CacheResult {
    /// Ratios derived from the two mean timings
    pub fn from_results(friendly: CategoryResult, unfriendly: CategoryResult) -> Self {
        let friendly_mean = friendly.stats.mean;
        let unfriendly_mean = unfriendly.stats.mean;

        let (access_ratio, miss_ratio) = if friendly_mean > 0.0 {
            (
                unfriendly_mean / friendly_mean,
                (unfriendly_mean - friendly_mean) / friendly_mean,
            )
        } else {
            (NEUTRAL_ACCESS_RATIO, NEUTRAL_MISS_RATIO)
        };

        Self {
            friendly,
            unfriendly,
            access_ratio,
            miss_ratio,
        }
    }

    /// Neutral result when nothing could be measured
    pub fn neutral() -> Self {
        Self {
            friendly: CategoryResult::empty(Category::CacheFriendly),
            unfriendly: CategoryResult::empty(Category::CacheUnfriendly),
            access_ratio: NEUTRAL_ACCESS_RATIO,
            miss_ratio: NEUTRAL_MISS_RATIO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheRunner {
    iterations: usize,
    buffer_bytes: usize,
    touches: usize,
    seed: u64,
}

impl CacheRunner {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            iterations: config.cache_iterations(),
            buffer_bytes: config.cache_buffer_bytes,
            touches: config.cache_touches,
            seed: config.shuffle_seed,
        }
    }

    /// Run every friendly pass, then every unfriendly pass
    pub fn run(&self) -> Result<CacheResult> {
        let mut buffer = match CacheBuffer::new(self.buffer_bytes, self.touches, self.seed) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!("Cache probe skipped: {}", err);
                return Ok(CacheResult::neutral());
            }
        };

        let mut friendly = SampleCollector::new(Category::CacheFriendly, self.iterations);
        friendly.begin_sampling()?;
        for _ in 0..self.iterations {
            friendly.record(time_ns(|| buffer.cache_friendly_access()))?;
        }

        let mut unfriendly = SampleCollector::new(Category::CacheUnfriendly, self.iterations);
        unfriendly.begin_sampling()?;
        for _ in 0..self.iterations {
            unfriendly.record(time_ns(|| buffer.cache_unfriendly_access()))?;
        }

        Ok(CacheResult::from_results(
            friendly.finish()?,
            unfriendly.finish()?,
        ))
    }
}
