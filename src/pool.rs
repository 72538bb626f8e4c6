//! Bounded worker batches for the thread scheduling probe
//!
//! A batch spawns a fixed number of worker threads that run the same task.
//! Workers report over a crossbeam channel; the caller blocks on the channel
//! (no polling) until every spawned worker has reported, joins them, and only
//! then reads the clock. The measured latency is the time to reach full batch
//! completion under contention.
//!
//! Failure policy:
//! - spawn errors, task errors and panics drop that worker from the batch
//! - workers still running at `timeout` are dropped and their threads detached
//! - a batch that hit the timeout never finished, so its latency is unusable
//! - otherwise the batch latency stays valid while at least one worker completed

use crate::error::{ProbeError, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Task executed by every worker; receives the worker index
pub type WorkerTask = Arc<dyn Fn(usize) -> Result<()> + Send + Sync>;

/// Result of one batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchOutcome {
    /// Time from first spawn until all surviving workers were joined
    pub latency_ns: f64,
    /// Workers that finished their task successfully
    pub completed: usize,
    /// Workers dropped from the batch
    pub failed: usize,
    /// The batch stopped waiting at the deadline with workers still running
    pub timed_out: bool,
}

impl BatchOutcome {
    /// A batch is usable when it finished before the deadline and at least
    /// one worker completed
    pub fn is_usable(&self) -> bool {
        !self.timed_out && self.completed > 0
    }
}

/// Fixed-size batch runner
#[derive(Debug, Clone)]
pub struct BatchPool {
    workers: usize,
    timeout: Duration,
}

impl BatchPool {
    /// Create a pool of `workers` threads per batch (at least one)
    pub fn new(workers: usize, timeout: Duration) -> Self {
        Self {
            workers: workers.max(1),
            timeout,
        }
    }

    /// Worker threads per batch
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Spawn one batch, wait for it to complete, and time it
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use vmprobe::pool::{BatchPool, WorkerTask};
    ///
    /// let pool = BatchPool::new(4, Duration::from_secs(5));
    /// let task: WorkerTask = Arc::new(|_worker| Ok(()));
    /// let outcome = pool.run_batch(&task);
    /// assert_eq!(outcome.completed, 4);
    /// assert_eq!(outcome.failed, 0);
    /// ```
    pub fn run_batch(&self, task: &WorkerTask) -> BatchOutcome {
        let (tx, rx) = channel::bounded::<(usize, Result<()>)>(self.workers);
        let mut handles: Vec<(usize, JoinHandle<()>)> = Vec::with_capacity(self.workers);
        let mut failed = 0;

        let start = Instant::now();
        let deadline = start + self.timeout;

        for worker in 0..self.workers {
            let tx = tx.clone();
            let task = Arc::clone(task);
            let spawned = thread::Builder::new()
                .name(format!("vmprobe-worker-{worker}"))
                .spawn(move || {
                    let result = task(worker);
                    // Receiver gone means the batch already timed out
                    let _ = tx.send((worker, result));
                });

            match spawned {
                Ok(handle) => handles.push((worker, handle)),
                Err(source) => {
                    let err = ProbeError::WorkerSpawn { worker, source };
                    warn!("{}", err);
                    failed += 1;
                }
            }
        }
        drop(tx);

        let mut reported = vec![false; self.workers];
        let mut completed = 0;
        let mut pending = handles.len();
        let mut timed_out = false;

        while pending > 0 {
            match rx.recv_deadline(deadline) {
                Ok((worker, Ok(()))) => {
                    reported[worker] = true;
                    completed += 1;
                    pending -= 1;
                }
                Ok((worker, Err(err))) => {
                    warn!("Dropping worker {} from batch: {}", worker, err);
                    reported[worker] = true;
                    failed += 1;
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    let err = ProbeError::WorkerTimeout {
                        pending,
                        timeout_ms: self.timeout.as_millis(),
                    };
                    warn!("{}", err);
                    timed_out = true;
                    break;
                }
                // Every sender is gone: the silent workers panicked
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for (worker, handle) in handles {
            if reported[worker] {
                let _ = handle.join();
            } else if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("Worker {} panicked", worker);
                }
                failed += 1;
            } else {
                debug!("Detaching worker {} after timeout", worker);
                failed += 1;
            }
        }

        let latency_ns = start.elapsed().as_nanos() as f64;

        BatchOutcome {
            latency_ns,
            completed,
            failed,
            timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_all_workers_complete() {
        let pool = BatchPool::new(4, Duration::from_secs(5));
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task: WorkerTask = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let outcome = pool.run_batch(&task);
        assert_eq!(outcome.completed, 4);
        assert_eq!(outcome.failed, 0);
        assert!(!outcome.timed_out);
        assert!(outcome.is_usable());
        assert!(outcome.latency_ns > 0.0);
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_failing_worker_is_dropped_not_substituted() {
        let pool = BatchPool::new(4, Duration::from_secs(5));
        let task: WorkerTask = Arc::new(|worker| {
            if worker == 2 {
                Err(ProbeError::WorkerFailed {
                    worker,
                    reason: "injected".to_string(),
                })
            } else {
                Ok(())
            }
        });

        let outcome = pool.run_batch(&task);
        assert_eq!(outcome.completed, 3);
        assert_eq!(outcome.failed, 1);
        assert!(outcome.is_usable());
    }

    #[test]
    fn test_panicking_worker_is_counted_as_failed() {
        let pool = BatchPool::new(3, Duration::from_secs(5));
        let task: WorkerTask = Arc::new(|worker| {
            if worker == 0 {
                panic!("worker blew up");
            }
            Ok(())
        });

        let outcome = pool.run_batch(&task);
        assert_eq!(outcome.completed, 2);
        assert_eq!(outcome.failed, 1);
    }

    #[test]
    fn test_all_failed_batch_is_unusable() {
        let pool = BatchPool::new(2, Duration::from_secs(5));
        let task: WorkerTask = Arc::new(|worker| {
            Err(ProbeError::WorkerFailed {
                worker,
                reason: "always".to_string(),
            })
        });

        let outcome = pool.run_batch(&task);
        assert_eq!(outcome.completed, 0);
        assert_eq!(outcome.failed, 2);
        assert!(!outcome.is_usable());
    }

    #[test]
    fn test_hung_worker_makes_batch_unusable() {
        let pool = BatchPool::new(2, Duration::from_millis(50));
        let task: WorkerTask = Arc::new(|worker| {
            if worker == 1 {
                thread::sleep(Duration::from_millis(500));
            }
            Ok(())
        });

        let outcome = pool.run_batch(&task);
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.failed, 1);
        assert!(outcome.timed_out);
        // The deadline is not a completion time
        assert!(!outcome.is_usable());
        assert!(outcome.latency_ns < 400_000_000.0);
    }

    #[test]
    fn test_failed_worker_without_timeout_stays_usable() {
        let pool = BatchPool::new(2, Duration::from_secs(5));
        let task: WorkerTask = Arc::new(|worker| {
            if worker == 0 {
                panic!("worker blew up");
            }
            Ok(())
        });

        let outcome = pool.run_batch(&task);
        assert_eq!(outcome.failed, 1);
        assert!(!outcome.timed_out);
        assert!(outcome.is_usable());
    }

    #[test]
    fn test_zero_workers_rounds_up_to_one() {
        let pool = BatchPool::new(0, Duration::from_secs(1));
        assert_eq!(pool.workers(), 1);
    }
}
