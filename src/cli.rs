//! CLI argument parsing for vmprobe

use crate::config::DEFAULT_ITERATIONS;
use crate::error::ProbeError;
use clap::{Parser, ValueEnum};

/// Output format for the measurement report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON report for machine parsing (default)
    Json,
    /// Human-readable sectioned summary
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "vmprobe")]
#[command(version)]
#[command(
    about = "Timing, scheduling, cache and allocation probes that fingerprint the execution environment",
    long_about = None
)]
pub struct Cli {
    /// Samples per timing benchmark; scheduling and cache probes scale from it
    #[arg(
        value_name = "ITERATIONS",
        default_value_t = DEFAULT_ITERATIONS,
        value_parser = parse_iterations,
        allow_negative_numbers = true
    )]
    pub iterations: usize,

    /// Output format (json or text)
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

/// Positive integer iteration count
pub fn parse_iterations(raw: &str) -> Result<usize, String> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not an integer", raw))?;

    if value <= 0 {
        return Err(ProbeError::InvalidIterations(value).to_string());
    }
    usize::try_from(value).map_err(|_| format!("{} is too large", value))
}
