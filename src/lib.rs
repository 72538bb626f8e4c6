//! vmprobe - execution environment fingerprinting through timing statistics
//!
//! This library runs a fixed set of micro-benchmarks (CPU timing, thread and
//! process scheduling latency, cache access patterns, heap allocation
//! entropy), reduces each sample sequence to moment statistics, and folds
//! them into a flat measurement report.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod pool;
pub mod report;
pub mod runner;
pub mod stats;
pub mod system_info;
pub mod workload;
