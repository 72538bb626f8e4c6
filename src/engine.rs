//! Sequential measurement run
//!
//! Gathers system info, then runs every category in a fixed order on the
//! calling thread. A runner error never aborts the run: the category is
//! logged and reported with neutral values.

use crate::config::ProbeConfig;
use crate::error::Result;
use crate::report::{MeasurementReport, ReportBuilder};
use crate::runner::{
    CacheResult, CacheRunner, Category, CategoryResult, EntropyEstimate, MemoryEntropyRunner,
    ProcessSchedulingRunner, ThreadSchedulingRunner, TimingRunner,
};
use crate::system_info::SystemInfo;
use tracing::{info, warn};

/// Runs every probe under one configuration
#[derive(Debug, Clone)]
pub struct Engine {
    config: ProbeConfig,
}

impl Engine {
    /// Validate `config` and build an engine
    pub fn new(config: ProbeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run all categories and seal the report
    ///
    /// # Example
    /// ```no_run
    /// use vmprobe::config::ProbeConfig;
    /// use vmprobe::engine::Engine;
    ///
    /// let report = Engine::new(ProbeConfig::quick()).unwrap().run();
    /// assert!(report.get("PHYSICAL_MACHINE_INDEX").is_some());
    /// ```
    pub fn run(&self) -> MeasurementReport {
        let config = &self.config;
        let system_info = SystemInfo::gather();
        let mut builder = ReportBuilder::new(config.index_scale);

        info!("Running basic timing ({} iterations)", config.iterations);
        builder.add_category(&category_or_empty(
            Category::TimingBasic,
            TimingRunner::basic(config).run(),
        ));

        info!("Running thread scheduling ({} batches)", config.thread_batches());
        builder.add_category(&category_or_empty(
            Category::SchedulingThread,
            ThreadSchedulingRunner::new(config).run(),
        ));

        info!(
            "Running multiprocess scheduling ({} batches)",
            config.process_batches()
        );
        builder.add_category(&category_or_empty(
            Category::SchedulingMultiproc,
            ProcessSchedulingRunner::new(config).run(),
        ));

        info!("Running consecutive timing ({} iterations)", config.iterations);
        builder.add_category(&category_or_empty(
            Category::TimingConsecutive,
            TimingRunner::consecutive(config).run(),
        ));

        info!(
            "Running cache behavior ({} iterations)",
            config.cache_iterations()
        );
        let cache = CacheRunner::new(config).run().unwrap_or_else(|err| {
            warn!("Cache probe failed: {}", err);
            CacheResult::neutral()
        });
        builder.add_cache(&cache);

        info!(
            "Running memory entropy ({} allocations)",
            config.allocation_probes
        );
        let entropy = MemoryEntropyRunner::new(config)
            .run()
            .unwrap_or_else(|err| {
                warn!("Memory entropy probe failed: {}", err);
                EntropyEstimate::empty()
            });
        builder.add_memory_entropy(&entropy);

        builder.finish(system_info)
    }
}

fn category_or_empty(category: Category, result: Result<CategoryResult>) -> CategoryResult {
    result.unwrap_or_else(|err| {
        warn!("{} failed: {}", category, err);
        CategoryResult::empty(category)
    })
}
