//! Error taxonomy for the measurement engine
//!
//! Only invalid input is fatal. Everything else is caught at the runner
//! boundary, logged, and turned into a dropped sample or a neutral metric.

use thiserror::Error;

/// Errors raised while configuring or running probes
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid iteration count: {0} (must be a positive integer)")]
    InvalidIterations(i64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    #[error("Failed to spawn worker thread {worker}: {source}")]
    WorkerSpawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {worker} failed: {reason}")]
    WorkerFailed { worker: usize, reason: String },

    #[error("{pending} worker(s) did not finish within {timeout_ms} ms")]
    WorkerTimeout { pending: usize, timeout_ms: u128 },

    #[error("Failed to fork worker process {worker}: {source}")]
    ProcessSpawn {
        worker: usize,
        #[source]
        source: nix::Error,
    },

    #[error("Worker process {pid} failed: {reason}")]
    ProcessFailed { pid: i32, reason: String },

    #[error("Invalid runner transition: {from} -> {to}")]
    InvalidState {
        from: &'static str,
        to: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_iterations_message() {
        let err = ProbeError::InvalidIterations(0);
        assert_eq!(
            err.to_string(),
            "Invalid iteration count: 0 (must be a positive integer)"
        );
    }

    #[test]
    fn test_allocation_message_names_size() {
        let err = ProbeError::Allocation { bytes: 1 << 20 };
        assert!(err.to_string().contains("1048576"));
    }

    #[test]
    fn test_worker_spawn_keeps_source() {
        use std::error::Error as _;

        let err = ProbeError::WorkerSpawn {
            worker: 2,
            source: std::io::Error::other("out of threads"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("worker thread 2"));
    }
}
