//! Measurement report
//!
//! [`ReportBuilder`] accumulates category statistics, indices, cache ratios
//! and entropy as a flat `metric name -> value` map. [`ReportBuilder::finish`]
//! fills any metric that was never measured with its neutral value, derives
//! the overall CVs, and returns an immutable [`MeasurementReport`].

use crate::index::{index_of, IndexScale, INDEX_SENTINEL};
use crate::runner::{
    CacheResult, Category, CategoryResult, EntropyEstimate, EntropyStrategy,
    NEUTRAL_ACCESS_RATIO, NEUTRAL_MISS_RATIO,
};
use crate::system_info::SystemInfo;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

pub const PHYSICAL_MACHINE_INDEX: &str = "PHYSICAL_MACHINE_INDEX";
pub const MULTIPROC_PHYSICAL_MACHINE_INDEX: &str = "MULTIPROC_PHYSICAL_MACHINE_INDEX";
pub const CACHE_ACCESS_RATIO: &str = "CACHE_ACCESS_RATIO";
pub const CACHE_MISS_RATIO: &str = "CACHE_MISS_RATIO";
pub const MEMORY_ADDRESS_ENTROPY: &str = "MEMORY_ADDRESS_ENTROPY";
pub const OVERALL_TIMING_CV: &str = "OVERALL_TIMING_CV";
pub const OVERALL_SCHEDULING_CV: &str = "OVERALL_SCHEDULING_CV";

/// Categories whose statistics appear in the report, in report order
pub const REPORTED_CATEGORIES: [Category; 4] = [
    Category::TimingBasic,
    Category::TimingConsecutive,
    Category::SchedulingThread,
    Category::SchedulingMultiproc,
];

const STAT_SUFFIXES: [&str; 5] = ["MEAN", "VARIANCE", "CV", "SKEWNESS", "KURTOSIS"];

const TIMING_CATEGORIES: [Category; 2] = [Category::TimingBasic, Category::TimingConsecutive];
const SCHEDULING_CATEGORIES: [Category; 2] =
    [Category::SchedulingThread, Category::SchedulingMultiproc];

/// Report key for one statistic of one category, e.g. `TIMING_BASIC_CV`
pub fn stat_key(category: Category, suffix: &str) -> String {
    format!("{}_{}", category.name(), suffix)
}

/// Every key a finished report carries, paired with its neutral value
pub fn report_keys() -> Vec<(String, f64)> {
    let mut keys: Vec<(String, f64)> = REPORTED_CATEGORIES
        .iter()
        .flat_map(|&category| {
            STAT_SUFFIXES
                .iter()
                .map(move |suffix| (stat_key(category, suffix), 0.0))
        })
        .collect();

    keys.extend([
        (PHYSICAL_MACHINE_INDEX.to_string(), INDEX_SENTINEL),
        (MULTIPROC_PHYSICAL_MACHINE_INDEX.to_string(), INDEX_SENTINEL),
        (CACHE_ACCESS_RATIO.to_string(), NEUTRAL_ACCESS_RATIO),
        (CACHE_MISS_RATIO.to_string(), NEUTRAL_MISS_RATIO),
        (MEMORY_ADDRESS_ENTROPY.to_string(), 0.0),
        (OVERALL_TIMING_CV.to_string(), 0.0),
        (OVERALL_SCHEDULING_CV.to_string(), 0.0),
    ]);
    keys
}

/// Mean of the non-zero values, or 0 when there are none
pub fn mean_of_nonzero(values: &[f64]) -> f64 {
    let nonzero: Vec<f64> = values.iter().copied().filter(|&v| v != 0.0).collect();
    if nonzero.is_empty() {
        0.0
    } else {
        nonzero.iter().sum::<f64>() / nonzero.len() as f64
    }
}

/// Sample counts for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSummary {
    pub category: Category,
    pub samples: usize,
    pub dropped: usize,
}

/// Accumulates metrics for one run
#[derive(Debug, Default)]
pub struct ReportBuilder {
    index_scale: IndexScale,
    measurements: BTreeMap<String, f64>,
    collection: Vec<CollectionSummary>,
    entropy_strategy: Option<EntropyStrategy>,
}

impl ReportBuilder {
    pub fn new(index_scale: IndexScale) -> Self {
        Self {
            index_scale,
            ..Self::default()
        }
    }

    /// Metrics are write-once; a second write is ignored
    fn insert(&mut self, key: String, value: f64) {
        if self.measurements.contains_key(&key) {
            warn!("Metric {} already recorded, keeping first value", key);
            return;
        }
        self.measurements.insert(key, value);
    }

    /// Five statistics keys, plus the composite index for scheduling
    pub fn add_category(&mut self, result: &CategoryResult) -> &mut Self {
        let category = result.category;
        let stats = &result.stats;
        let values = [
            stats.mean,
            stats.variance,
            stats.cv,
            stats.skewness,
            stats.kurtosis,
        ];
        for (suffix, value) in STAT_SUFFIXES.iter().zip(values) {
            self.insert(stat_key(category, suffix), value);
        }

        match category {
            Category::SchedulingThread => {
                let index = index_of(stats, self.index_scale);
                self.insert(PHYSICAL_MACHINE_INDEX.to_string(), index);
            }
            Category::SchedulingMultiproc => {
                let index = index_of(stats, self.index_scale);
                self.insert(MULTIPROC_PHYSICAL_MACHINE_INDEX.to_string(), index);
            }
            _ => {}
        }

        self.collection.push(CollectionSummary {
            category,
            samples: result.samples,
            dropped: result.dropped,
        });
        self
    }

    pub fn add_cache(&mut self, cache: &CacheResult) -> &mut Self {
        self.insert(CACHE_ACCESS_RATIO.to_string(), cache.access_ratio);
        self.insert(CACHE_MISS_RATIO.to_string(), cache.miss_ratio);
        for result in [&cache.friendly, &cache.unfriendly] {
            self.collection.push(CollectionSummary {
                category: result.category,
                samples: result.samples,
                dropped: result.dropped,
            });
        }
        self
    }

    pub fn add_memory_entropy(&mut self, estimate: &EntropyEstimate) -> &mut Self {
        self.insert(MEMORY_ADDRESS_ENTROPY.to_string(), estimate.value);
        self.entropy_strategy = estimate.strategy;
        self
    }

    fn overall_cv(&self, categories: &[Category]) -> f64 {
        let cvs: Vec<f64> = categories
            .iter()
            .filter_map(|&c| self.measurements.get(&stat_key(c, "CV")).copied())
            .collect();
        mean_of_nonzero(&cvs)
    }

    /// Seal the report
    pub fn finish(mut self, system_info: SystemInfo) -> MeasurementReport {
        let timing_cv = self.overall_cv(&TIMING_CATEGORIES);
        let scheduling_cv = self.overall_cv(&SCHEDULING_CATEGORIES);
        self.insert(OVERALL_TIMING_CV.to_string(), timing_cv);
        self.insert(OVERALL_SCHEDULING_CV.to_string(), scheduling_cv);

        for (key, neutral) in report_keys() {
            self.measurements.entry(key).or_insert(neutral);
        }

        MeasurementReport {
            system_info,
            measurements: self.measurements,
            collection: self.collection,
            entropy_strategy: self.entropy_strategy,
        }
    }
}

/// Finished report: host info plus the flat metric map
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementReport {
    pub system_info: SystemInfo,
    pub measurements: BTreeMap<String, f64>,
    #[serde(skip)]
    pub collection: Vec<CollectionSummary>,
    #[serde(skip)]
    pub entropy_strategy: Option<EntropyStrategy>,
}

impl MeasurementReport {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.measurements.get(key).copied()
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    fn metric(&self, key: &str) -> f64 {
        self.get(key).unwrap_or(0.0)
    }

    fn write_category(
        &self,
        f: &mut fmt::Formatter<'_>,
        title: &str,
        category: Category,
    ) -> fmt::Result {
        writeln!(f, "\n{}:", title)?;
        writeln!(f, "  Mean: {:.2} ns", self.metric(&stat_key(category, "MEAN")))?;
        writeln!(f, "  Variance: {:.2}", self.metric(&stat_key(category, "VARIANCE")))?;
        writeln!(f, "  CV: {:.4}", self.metric(&stat_key(category, "CV")))?;
        writeln!(f, "  Skewness: {:.4}", self.metric(&stat_key(category, "SKEWNESS")))?;
        writeln!(f, "  Kurtosis: {:.4}", self.metric(&stat_key(category, "KURTOSIS")))?;
        if let Some(summary) = self.collection.iter().find(|s| s.category == category) {
            writeln!(
                f,
                "  Samples: {} ({} dropped)",
                summary.samples, summary.dropped
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for MeasurementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        let info = &self.system_info;

        writeln!(f, "{rule}\nSYSTEM INFORMATION\n{rule}")?;
        writeln!(f, "Platform: {}", info.platform)?;
        writeln!(f, "Hostname: {}", info.hostname)?;
        writeln!(f, "Machine: {}", info.machine)?;
        writeln!(f, "Kernel: {}", info.kernel_version)?;
        writeln!(f, "CPU Count: {}", info.cpu_count)?;
        if info.total_memory > 0 {
            let gib = info.total_memory as f64 / (1024.0 * 1024.0 * 1024.0);
            writeln!(f, "Total Memory: {:.2} GB", gib)?;
        }
        if info.cpu_freq_mhz > 0 {
            writeln!(f, "CPU Frequency: {} MHz", info.cpu_freq_mhz)?;
        }
        writeln!(f, "Timestamp: {}", info.timestamp)?;

        writeln!(f, "\n{rule}\nMEASUREMENT RESULTS\n{rule}")?;
        self.write_category(f, "Timing Basic Measurements", Category::TimingBasic)?;
        self.write_category(f, "Consecutive Timing Measurements", Category::TimingConsecutive)?;
        self.write_category(f, "Thread Scheduling Measurements", Category::SchedulingThread)?;
        writeln!(
            f,
            "  Physical Machine Index: {:.4}",
            self.metric(PHYSICAL_MACHINE_INDEX)
        )?;
        self.write_category(
            f,
            "Multiprocessing Scheduling Measurements",
            Category::SchedulingMultiproc,
        )?;
        writeln!(
            f,
            "  Multiproc Physical Machine Index: {:.4}",
            self.metric(MULTIPROC_PHYSICAL_MACHINE_INDEX)
        )?;

        writeln!(f, "\nCache Behavior Measurements:")?;
        writeln!(f, "  Access Ratio: {:.4}", self.metric(CACHE_ACCESS_RATIO))?;
        writeln!(f, "  Miss Ratio: {:.4}", self.metric(CACHE_MISS_RATIO))?;

        writeln!(f, "\nMemory Measurements:")?;
        write!(
            f,
            "  Address Entropy: {:.4}",
            self.metric(MEMORY_ADDRESS_ENTROPY)
        )?;
        match self.entropy_strategy {
            Some(strategy) => writeln!(f, " bits ({})", strategy)?,
            None => writeln!(f, " bits")?,
        }

        writeln!(f, "\nOverall Metrics:")?;
        writeln!(f, "  Overall Timing CV: {:.4}", self.metric(OVERALL_TIMING_CV))?;
        writeln!(
            f,
            "  Overall Scheduling CV: {:.4}",
            self.metric(OVERALL_SCHEDULING_CV)
        )
    }
}
