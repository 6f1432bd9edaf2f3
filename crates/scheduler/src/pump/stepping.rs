use std::sync::atomic::Ordering;

use tracing::{debug, error, warn};

use crate::coroutine::{Fault, Signal};
use crate::error::{PumpError, TaskError};
use crate::queue::{Entry, Job, JobRun};
use crate::task::{Outcome, Resumable};
use crate::types::BlockPolicy;

use super::Scheduler;

/// What a single pump iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// Stop looping: cancelling, or stopping with an empty queue.
    Halt,
    /// Queue was empty, or the entry taken was a blocked task that is still
    /// waiting; try again later.
    Idle,
    /// One entry was processed.
    Progress,
}

impl Scheduler {
    /// Execute at most one unit of scheduled work.
    ///
    /// Returns `Ok(false)` when pumping should cease. A fatal interrupt
    /// raised by a task is recorded on that task and returned as `Err`.
    pub fn pump_single(&self) -> Result<bool, PumpError> {
        Ok(self.pump_once()? != PumpStatus::Halt)
    }

    /// Like [`Scheduler::pump_single`], but tells idle apart from progress.
    pub fn pump_once(&self) -> Result<PumpStatus, PumpError> {
        if self.cancelling.load(Ordering::Acquire) {
            return Ok(PumpStatus::Halt);
        }

        let Some(entry) = self.queue.pop() else {
            return Ok(if self.stopping.load(Ordering::Acquire) {
                PumpStatus::Halt
            } else {
                PumpStatus::Idle
            });
        };

        let _host = self.host.get().map(|handle| handle.enter());
        match entry {
            Entry::Job(job) => {
                self.run_job(job);
                Ok(PumpStatus::Progress)
            }
            Entry::Task(task) => self.step_task(task),
        }
    }

    /// Call [`Scheduler::pump_once`] until it halts.
    pub fn pump_busy_loop(&self) -> Result<(), PumpError> {
        loop {
            match self.pump_once()? {
                PumpStatus::Halt => return Ok(()),
                PumpStatus::Idle => self.idle(),
                PumpStatus::Progress => {}
            }
        }
    }

    fn idle(&self) {
        match self.config.idle_pause() {
            Some(pause) => std::thread::sleep(pause),
            None => std::thread::yield_now(),
        }
    }

    /// Invoke a plain job exactly once. Jobs are never re-enqueued.
    fn run_job(&self, job: Job) {
        match job() {
            JobRun::Ran => {}
            JobRun::Skipped => debug!("job skipped, handle dropped before start"),
            JobRun::Failed(message) => {
                warn!(error = %message, "job failed");
                self.counters.record_failure(message);
            }
        }
        self.counters.record_step();
    }

    /// Resume a task once and act on the outcome.
    ///
    /// A deferred rotation resumes nothing and reports `Idle`.
    fn step_task(&self, mut task: Box<dyn Resumable>) -> Result<PumpStatus, PumpError> {
        let id = task.id();
        let cancel_delivery = task.cancel_requested();

        if self.config.block_policy == BlockPolicy::AwaitReady && !cancel_delivery {
            let still_waiting = task.waiting_on().is_some_and(|target| !target.is_ready());
            if still_waiting {
                self.counters.record_deferred();
                self.requeue(Entry::Task(task));
                return Ok(PumpStatus::Idle);
            }
            task.set_waiting_on(None);
        }

        let signal = if cancel_delivery {
            Signal::Cancel
        } else {
            Signal::Resume
        };
        let outcome = task.resume(signal);
        self.counters.record_step();

        match outcome {
            Outcome::Completed => debug!(task = %id, "task completed"),
            Outcome::Cancelled => {
                task.mark_cancelled();
                debug!(task = %id, "task cancelled");
            }
            Outcome::Raised(Fault::Interrupt(interrupt)) => {
                error!(task = %id, %interrupt, "fatal interrupt, halting pump");
                self.settle_failure(&*task, TaskError::Interrupted(interrupt));
                return Err(PumpError::Interrupted { task: id, interrupt });
            }
            Outcome::Raised(Fault::Error(message)) => {
                self.settle_failure(&*task, TaskError::Failed(message));
            }
            Outcome::Panicked(message) => {
                self.settle_failure(&*task, TaskError::Panicked(message));
            }
            Outcome::Blocking(target) if target.is_task(id) => {
                self.settle_failure(&*task, TaskError::SelfWait(id));
            }
            Outcome::Blocking(_) | Outcome::Yielding if cancel_delivery => {
                debug!(task = %id, "cancelled task dropped after cancellation delivery");
            }
            Outcome::Blocking(target) => {
                debug!(task = %id, on = %target, "task blocked, re-enqueueing");
                if self.config.block_policy == BlockPolicy::AwaitReady {
                    task.set_waiting_on(Some(target));
                }
                self.requeue(Entry::Task(task));
            }
            Outcome::Yielding => {
                debug!(task = %id, "task yielded, re-enqueueing");
                self.requeue(Entry::Task(task));
            }
        }
        Ok(PumpStatus::Progress)
    }

    fn settle_failure(&self, task: &dyn Resumable, error: TaskError) {
        let id = task.id();
        let message = error.to_string();
        if task.fail(error) {
            warn!(task = %id, error = %message, "task failed");
            self.counters.record_failure(format!("{id}: {message}"));
        } else {
            debug!(task = %id, error = %message, "failure discarded, slot already terminal");
        }
    }
}
