use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::coroutine::{Coroutine, FutureCoroutine};
use crate::error::SubmitError;
use crate::metrics::{Counters, PumpMetrics};
use crate::queue::{Entry, Job, WorkQueue};
use crate::task::{new_task, TaskHandle};
use crate::types::{OverflowPolicy, SchedulerConfig};

/// Cooperative scheduler over a single shared FIFO queue.
///
/// Producers call [`Scheduler::submit`]; one or more pump threads call
/// [`Scheduler::pump_single`] or [`Scheduler::pump_busy_loop`]. Every
/// instance owns its own flags and counters.
pub struct Scheduler {
    pub(super) config: SchedulerConfig,
    pub(super) queue: WorkQueue,
    /// Drain-and-halt requested. Never reset.
    pub(super) stopping: AtomicBool,
    /// Immediate halt requested. Never reset; overrides `stopping`.
    pub(super) cancelling: AtomicBool,
    pub(super) counters: Counters,
    /// Host runtime entered around every pump step once attached.
    pub(super) host: OnceLock<Handle>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            queue: WorkQueue::new(config.capacity),
            config,
            stopping: AtomicBool::new(false),
            cancelling: AtomicBool::new(false),
            counters: Counters::default(),
            host: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Wrap a computation in a task and enqueue it.
    ///
    /// Never resumes the computation on the calling thread. Under the
    /// `drop` overflow policy a full queue still yields `Ok`, but the task is
    /// discarded and its handle never finishes.
    pub fn submit<C: Coroutine>(&self, computation: C) -> Result<TaskHandle<C::Output>, SubmitError> {
        let (task, handle) = new_task(computation);
        debug!(task = %handle.id(), "submitting task");
        self.enqueue(Entry::Task(task))?;
        Ok(handle)
    }

    /// Submit a native future; each poll is one step.
    pub fn submit_future<F>(&self, future: F) -> Result<TaskHandle<F::Output>, SubmitError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.submit(FutureCoroutine::new(future))
    }

    pub(crate) fn submit_job(&self, job: Job) -> Result<(), SubmitError> {
        self.enqueue(Entry::Job(job))
    }

    fn enqueue(&self, entry: Entry) -> Result<(), SubmitError> {
        if self.queue.push(entry).is_ok() {
            return Ok(());
        }

        let capacity = self.queue.capacity().unwrap_or_default();
        match self.config.overflow {
            OverflowPolicy::Drop => {
                self.counters.record_drop();
                warn!(capacity, "queue full, submission dropped");
                Ok(())
            }
            OverflowPolicy::Reject => Err(SubmitError::QueueFull { capacity }),
        }
    }

    /// Put an in-flight entry back at the tail. There is no caller to refuse
    /// to, so a full queue always drops and counts.
    pub(super) fn requeue(&self, entry: Entry) {
        if self.queue.push(entry).is_err() {
            self.counters.record_drop();
            warn!("queue full, re-enqueued task dropped");
        }
    }

    /// Request a halt.
    ///
    /// Always sets `stopping`: pumps drain the queue, then report halt.
    /// With `cancel_tasks` also sets `cancelling`: pumps halt at once and
    /// queued work is abandoned. `wait` is accepted but
    /// does not block; join a [`PumpPool`](super::PumpPool) for that.
    pub fn shutdown(&self, wait: bool, cancel_tasks: bool) {
        info!(wait, cancel_tasks, queued = self.queue.len(), "scheduler shutdown requested");
        self.stopping.store(true, Ordering::Release);
        if cancel_tasks {
            self.cancelling.store(true, Ordering::Release);
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancelling.load(Ordering::Acquire)
    }

    /// Entries currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Total pump steps performed so far.
    pub fn steps(&self) -> u64 {
        self.counters.steps()
    }

    /// Get a snapshot of the current counters and flags.
    pub fn metrics(&self) -> PumpMetrics {
        self.counters
            .snapshot(self.queue.len(), self.is_stopping(), self.is_cancelling())
    }

    /// Record the host runtime to enter around pump steps. First call wins.
    pub(crate) fn attach_host(&self, handle: &Handle) {
        if self.host.set(handle.clone()).is_ok() {
            debug!("host runtime attached to scheduler");
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
