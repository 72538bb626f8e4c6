//! Thread and process scheduling latency
//!
//! Both runners time how long a batch of concurrent CPU workers takes to
//! complete. Batch counts come from [`ProbeConfig`]; a batch is dropped when
//! none of its workers completed or when it was cut off by the worker timeout.

use super::{Category, CategoryResult, SampleCollector};
use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::pool::{BatchPool, WorkerTask};
use crate::workload::cpu_bound_task;
use nix::errno::Errno;
use nix::sys::signal::{raise, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Batches of worker threads running the CPU workload
pub struct ThreadSchedulingRunner {
    pool: BatchPool,
    batches: usize,
    task: WorkerTask,
}

impl ThreadSchedulingRunner {
    pub fn new(config: &ProbeConfig) -> Self {
        let pool = BatchPool::new(config.worker_count, config.worker_timeout);
        Self::with_task(pool, config.thread_batches(), default_task())
    }

    /// Runner with a custom per-worker task
    pub fn with_task(pool: BatchPool, batches: usize, task: WorkerTask) -> Self {
        Self {
            pool,
            batches,
            task,
        }
    }

    pub fn run(&self) -> Result<CategoryResult> {
        let mut collector = SampleCollector::new(Category::SchedulingThread, self.batches);
        collector.begin_sampling()?;

        for batch in 0..self.batches {
            let outcome = self.pool.run_batch(&self.task);
            if outcome.failed > 0 {
                warn!(
                    "Thread batch {}: {} of {} workers dropped",
                    batch,
                    outcome.failed,
                    self.pool.workers()
                );
            }

            if outcome.timed_out {
                warn!("Thread batch {}: timed out, dropping sample", batch);
            }

            if outcome.is_usable() {
                collector.record(outcome.latency_ns)?;
            } else {
                collector.drop_sample()?;
            }
        }

        collector.finish()
    }
}

fn default_task() -> WorkerTask {
    Arc::new(|_worker| {
        black_box(cpu_bound_task());
        Ok(())
    })
}

/// How a forked worker leaves once its workload is done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// `_exit` with this status; 0 is success
    Status(i32),
    /// Raise this signal against itself
    Signal(Signal),
}

impl Default for ChildExit {
    fn default() -> Self {
        ChildExit::Status(0)
    }
}

/// Batches of forked child processes running the CPU workload
#[derive(Debug, Clone)]
pub struct ProcessSchedulingRunner {
    workers: usize,
    batches: usize,
    child_exit: ChildExit,
}

impl ProcessSchedulingRunner {
    pub fn new(config: &ProbeConfig) -> Self {
        Self::with_batches(config.worker_count, config.process_batches())
    }

    pub fn with_batches(workers: usize, batches: usize) -> Self {
        Self {
            workers: workers.max(1),
            batches,
            child_exit: ChildExit::default(),
        }
    }

    /// Make every child leave through `exit` instead of a clean `_exit(0)`
    pub fn with_child_exit(mut self, exit: ChildExit) -> Self {
        self.child_exit = exit;
        self
    }

    pub fn run(&self) -> Result<CategoryResult> {
        let mut collector = SampleCollector::new(Category::SchedulingMultiproc, self.batches);
        collector.begin_sampling()?;

        for batch in 0..self.batches {
            let (latency_ns, completed, failed) = self.run_batch();
            if failed > 0 {
                warn!(
                    "Process batch {}: {} of {} workers dropped",
                    batch, failed, self.workers
                );
            }

            if completed > 0 {
                collector.record(latency_ns)?;
            } else {
                collector.drop_sample()?;
            }
        }

        collector.finish()
    }

    /// Fork every worker, reap every child, and time the whole batch
    fn run_batch(&self) -> (f64, usize, usize) {
        let mut children: Vec<Pid> = Vec::with_capacity(self.workers);
        let mut failed = 0;

        let start = Instant::now();
        for worker in 0..self.workers {
            match spawn_worker(self.child_exit) {
                Ok(child) => children.push(child),
                Err(source) => {
                    warn!("{}", ProbeError::ProcessSpawn { worker, source });
                    failed += 1;
                }
            }
        }

        let mut completed = 0;
        for child in children {
            match reap(child) {
                Ok(()) => completed += 1,
                Err(err) => {
                    warn!("{}", err);
                    failed += 1;
                }
            }
        }
        let latency_ns = start.elapsed().as_nanos() as f64;

        (latency_ns, completed, failed)
    }
}

fn spawn_worker(exit: ChildExit) -> std::result::Result<Pid, nix::Error> {
    // SAFETY: the child only runs the allocation-free CPU task and then
    // leaves through raise or _exit, both async-signal-safe, skipping atexit
    // handlers and stdio flushes.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            black_box(cpu_bound_task());
            let status = match exit {
                ChildExit::Status(code) => code,
                ChildExit::Signal(signal) => {
                    let _ = raise(signal);
                    1
                }
            };
            unsafe { libc::_exit(status) }
        }
    }
}

fn reap(child: Pid) -> Result<()> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, 0)) => return Ok(()),
            Ok(WaitStatus::Exited(pid, code)) => {
                return Err(ProbeError::ProcessFailed {
                    pid: pid.as_raw(),
                    reason: format!("exited with status {code}"),
                })
            }
            Ok(WaitStatus::Signaled(pid, signal, _)) => {
                return Err(ProbeError::ProcessFailed {
                    pid: pid.as_raw(),
                    reason: format!("killed by {signal:?}"),
                })
            }
            // Stopped/continued: keep waiting for termination
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                return Err(ProbeError::ProcessFailed {
                    pid: child.as_raw(),
                    reason: format!("waitpid failed: {errno}"),
                })
            }
        }
    }
}
