//! Tick-based job scheduling on the tokio runtime.
//!
//! Delays and periods are given in simulation ticks and converted with the
//! current tick length. Repeating jobs are named and tracked so that
//! [`TickScheduler::cancel_all`] can abort them together; one-shot delayed
//! jobs are fire-and-forget and must check on their own whether their
//! target still exists when they run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Errors that can occur when creating a scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// No tokio runtime is available on this thread.
    #[error("no tokio runtime available: {source}")]
    NoRuntime {
        /// The underlying runtime lookup error.
        #[from]
        source: tokio::runtime::TryCurrentError,
    },
}

/// A tracked repeating job.
#[derive(Debug)]
struct ScheduledJob {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Runs jobs on a tick clock.
#[derive(Debug)]
pub struct TickScheduler {
    runtime: Handle,
    /// Current tick length in milliseconds (runtime-adjustable).
    tick_millis: AtomicU64,
    jobs: Mutex<Vec<ScheduledJob>>,
}

impl TickScheduler {
    /// Create a scheduler on the given runtime.
    pub fn new(runtime: Handle, tick: Duration) -> Self {
        Self {
            runtime,
            tick_millis: AtomicU64::new(duration_millis(tick)),
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Create a scheduler on the runtime the caller is running in.
    pub fn on_current_runtime(tick: Duration) -> Result<Self, SchedulerError> {
        Ok(Self::new(Handle::try_current()?, tick))
    }

    /// Current tick length.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.load(Ordering::Acquire))
    }

    /// Change the tick length. Applies to jobs scheduled afterwards.
    pub fn set_tick(&self, tick: Duration) {
        self.tick_millis.store(duration_millis(tick), Ordering::Release);
    }

    /// Real time spanned by `ticks` simulation ticks.
    pub fn ticks(&self, ticks: u64) -> Duration {
        Duration::from_millis(self.tick_millis.load(Ordering::Acquire).saturating_mul(ticks))
    }

    /// Run `job` after `delay_ticks`, then every `period_ticks` (at least 1).
    pub fn repeating<F>(&self, name: &'static str, delay_ticks: u64, period_ticks: u64, job: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let start = Instant::now()
            .checked_add(self.ticks(delay_ticks))
            .unwrap_or_else(Instant::now);
        let period = self.ticks(period_ticks.max(1));
        let handle = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                job();
            }
        });
        debug!(job = name, delay_ticks, period_ticks, "Repeating job scheduled");
        self.lock_jobs().push(ScheduledJob { name, handle });
    }

    /// Run `job` once after `delay_ticks`. Not affected by [`Self::cancel_all`].
    pub fn delayed<F>(&self, name: &'static str, delay_ticks: u64, job: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = self.ticks(delay_ticks);
        debug!(job = name, delay_ticks, "Delayed job scheduled");
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            job();
        })
    }

    /// Abort every repeating job. Returns how many were running.
    pub fn cancel_all(&self) -> usize {
        let jobs: Vec<ScheduledJob> = self.lock_jobs().drain(..).collect();
        for job in &jobs {
            job.handle.abort();
        }
        if !jobs.is_empty() {
            debug!(count = jobs.len(), "Cancelled all repeating jobs");
        }
        jobs.len()
    }

    /// Names of the repeating jobs currently tracked.
    pub fn active_jobs(&self) -> Vec<&'static str> {
        self.lock_jobs()
            .iter()
            .filter(|job| !job.handle.is_finished())
            .map(|job| job.name)
            .collect()
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, Vec<ScheduledJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn duration_millis(tick: Duration) -> u64 {
    u64::try_from(tick.as_millis()).unwrap_or(u64::MAX).max(1)
}
