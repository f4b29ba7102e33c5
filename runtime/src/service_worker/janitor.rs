//! Cache Janitor
//!
//! Periodic FIFO trimming of oversized caches. The period is driven by an
//! injected [`Scheduler`], so tests fire sweeps by hand instead of waiting
//! on a wall clock.
//!
//! The sweep only runs while the worker instance is alive. Hosts routinely
//! terminate idle workers, so in practice a 24 hour period may never fire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use spin::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::cache::{CacheError, CacheStorage};
use super::config::JanitorConfig;

/// A periodic job
pub type Job = Arc<dyn Fn() + Send + Sync>;

/// Scheduling errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The scheduler needs a Tokio runtime and none is entered
    #[error("no Tokio runtime to run the job on: {0}")]
    NoRuntime(String),
}

/// Periodic job scheduler
pub trait Scheduler: Send + Sync {
    /// Run `job` every `period` until the returned handle is cancelled.
    fn schedule_every(&self, period: Duration, job: Job) -> Result<ScheduleHandle, ScheduleError>;
}

/// Handle to a scheduled job
#[derive(Debug)]
pub struct ScheduleHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    fn new(cancelled: Arc<AtomicBool>, task: Option<JoinHandle<()>>) -> Self {
        Self { cancelled, task }
    }

    /// Stop the job
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduler backed by `tokio::time::interval`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_every(&self, period: Duration, job: Job) -> Result<ScheduleHandle, ScheduleError> {
        let runtime = Handle::try_current().map_err(|err| ScheduleError::NoRuntime(err.to_string()))?;
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; the job runs one period later.
            interval.tick().await;
            loop {
                interval.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                job();
            }
        });
        Ok(ScheduleHandle::new(cancelled, Some(task)))
    }
}

struct ManualJob {
    period: Duration,
    job: Job,
    cancelled: Arc<AtomicBool>,
}

/// Scheduler that only runs jobs when told to
#[derive(Default)]
pub struct ManualScheduler {
    jobs: Mutex<Vec<ManualJob>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every live job once. Returns how many ran.
    pub fn fire(&self) -> usize {
        let jobs: Vec<Job> = {
            let mut jobs = self.jobs.lock();
            jobs.retain(|j| !j.cancelled.load(Ordering::SeqCst));
            jobs.iter().map(|j| Arc::clone(&j.job)).collect()
        };
        for job in &jobs {
            job();
        }
        jobs.len()
    }

    /// Periods of the live jobs
    pub fn periods(&self) -> Vec<Duration> {
        self.jobs
            .lock()
            .iter()
            .filter(|j| !j.cancelled.load(Ordering::SeqCst))
            .map(|j| j.period)
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_every(&self, period: Duration, job: Job) -> Result<ScheduleHandle, ScheduleError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.jobs.lock().push(ManualJob {
            period,
            job,
            cancelled: Arc::clone(&cancelled),
        });
        Ok(ScheduleHandle::new(cancelled, None))
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// `(cache name, entries removed)` for every trimmed cache
    pub trimmed: Vec<(String, usize)>,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.trimmed.iter().map(|(_, n)| n).sum()
    }
}

/// Trims caches above the entry ceiling
#[derive(Debug, Clone)]
pub struct CacheJanitor {
    storage: CacheStorage,
    max_entries: usize,
    trim_to: usize,
}

impl CacheJanitor {
    pub fn new(storage: CacheStorage, config: &JanitorConfig) -> Self {
        Self {
            storage,
            max_entries: config.max_entries,
            trim_to: config.trim_to,
        }
    }

    /// Trim every cache holding more than the ceiling down to the target,
    /// dropping the oldest insertions first.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for name in self.storage.keys() {
            match self.trim(&name) {
                Ok(0) => {}
                Ok(removed) => {
                    log::info!("[SW] Trimmed {} entries from {}", removed, name);
                    report.trimmed.push((name, removed));
                }
                // Deleted between listing and trimming.
                Err(err) => log::debug!("[SW] Skipping {}: {}", name, err),
            }
        }
        report
    }

    fn trim(&self, name: &str) -> Result<usize, CacheError> {
        if self.storage.entry_count(name)? <= self.max_entries {
            return Ok(0);
        }
        self.storage.trim_oldest(name, self.trim_to)
    }

    /// Register the sweep on `scheduler` with the configured period.
    pub fn start(&self, scheduler: &dyn Scheduler, period: Duration) -> Result<ScheduleHandle, ScheduleError> {
        let janitor = self.clone();
        scheduler.schedule_every(
            period,
            Arc::new(move || {
                janitor.sweep();
            }),
        )
    }
}
