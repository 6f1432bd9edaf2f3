//! Bridging executor.
//!
//! [`QueueExecutor`] exposes the scheduler as a plain job executor (submit a
//! callable, get a [`JobHandle`] back) and lets a tokio host drive one
//! externally owned computation through the pump threads, one resumption per
//! job, via [`QueueExecutor::exec_on_queue`].

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::coroutine::{Coroutine, Fault, Signal, Step};
use crate::error::{JobError, PumpError, SubmitError};
use crate::pump::Scheduler;
use crate::queue::{Job, JobRun};
use crate::task::panic_message;
use crate::types::SchedulerConfig;
use crate::wait::WaitTarget;

/// Status reports buffered between the driver and the consumer.
const REPORT_BUFFER: usize = 16;

// ── Status records ──────────────────────────────────────────────────

/// One status record per resumption step.
///
/// Serializes to `{"status": ..., "value"?, "exception"?, "on"?}`;
/// `cancelled` carries no payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepReport<T> {
    Done {
        value: T,
    },
    Cancelled,
    Raised {
        exception: String,
    },
    Blocking {
        on: WaitTarget,
    },
    Yielding,
}

impl<T> StepReport<T> {
    fn from_step(step: Step<T>) -> Self {
        match step {
            Step::Complete(value) => StepReport::Done { value },
            Step::Yield => StepReport::Yielding,
            Step::Block(on) => StepReport::Blocking { on },
            Step::Cancelled => StepReport::Cancelled,
            Step::Raise(fault @ Fault::Interrupt(_)) => StepReport::Raised {
                exception: fault.to_string(),
            },
            Step::Raise(Fault::Error(message)) => StepReport::Raised { exception: message },
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            StepReport::Done { .. } => "done",
            StepReport::Cancelled => "cancelled",
            StepReport::Raised { .. } => "raised",
            StepReport::Blocking { .. } => "blocking",
            StepReport::Yielding => "yielding",
        }
    }

    /// `done`, `cancelled` and `raised` end the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepReport::Done { .. } | StepReport::Cancelled | StepReport::Raised { .. }
        )
    }
}

/// Async sequence of [`StepReport`]s; ends after the terminal record.
pub struct StepReports<T> {
    rx: mpsc::Receiver<StepReport<T>>,
}

impl<T> StepReports<T> {
    /// Next record, or `None` once the sequence has ended.
    pub async fn recv(&mut self) -> Option<StepReport<T>> {
        self.rx.recv().await
    }

    /// Drain the whole sequence.
    pub async fn collect_all(mut self) -> Vec<StepReport<T>> {
        let mut out = Vec::new();
        while let Some(report) = self.rx.recv().await {
            out.push(report);
        }
        out
    }
}

impl<T> Stream for StepReports<T> {
    type Item = StepReport<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

// ── Job handles ─────────────────────────────────────────────────────

/// Future for the result of a submitted job.
///
/// Dropping it (or calling [`JobHandle::cancel`]) before a pump reaches the
/// job makes the pump skip the callable.
pub struct JobHandle<T> {
    rx: oneshot::Receiver<Result<T, JobError>>,
}

impl<T> JobHandle<T> {
    /// Give up on the job. It will not run if it has not started yet.
    pub fn cancel(mut self) {
        self.rx.close();
    }

    /// Non-blocking poll for the result.
    pub fn try_result(&mut self) -> Option<Result<T, JobError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(JobError::Abandoned)),
        }
    }

    /// Block the current thread until the job finishes.
    ///
    /// Must not be called from inside an async context.
    pub fn blocking_result(self) -> Result<T, JobError> {
        self.rx.blocking_recv().unwrap_or(Err(JobError::Abandoned))
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T, JobError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(JobError::Abandoned)))
    }
}

// ── QueueExecutor ───────────────────────────────────────────────────

/// Job-executor facade over a shared [`Scheduler`].
#[derive(Clone)]
pub struct QueueExecutor {
    scheduler: Arc<Scheduler>,
}

impl QueueExecutor {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_scheduler(Arc::new(Scheduler::new(config)))
    }

    pub fn with_scheduler(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Enqueue a callable as a zero-step job.
    ///
    /// A pump invokes it once, synchronously; its `Ok`, `Err` or panic is
    /// routed into the returned handle.
    pub fn submit<F, T>(&self, f: F) -> Result<JobHandle<T>, SubmitError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            if tx.is_closed() {
                return JobRun::Skipped;
            }
            let (delivered, run) = match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(Ok(value)) => (Ok(value), JobRun::Ran),
                Ok(Err(e)) => {
                    let message = format!("{e:#}");
                    (Err(JobError::Failed(message.clone())), JobRun::Failed(message))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    (Err(JobError::Panicked(message.clone())), JobRun::Failed(message))
                }
            };
            // The receiver may have gone away while the job ran.
            let _ = tx.send(delivered);
            run
        });
        self.scheduler.submit_job(job)?;
        Ok(JobHandle { rx })
    }

    pub fn shutdown(&self, wait: bool, cancel_tasks: bool) {
        self.scheduler.shutdown(wait, cancel_tasks);
    }

    pub fn pump_single(&self) -> Result<bool, PumpError> {
        self.scheduler.pump_single()
    }

    pub fn pump_busy_loop(&self) -> Result<(), PumpError> {
        self.scheduler.pump_busy_loop()
    }

    /// Drive `computation` through the pump one resumption at a time.
    ///
    /// Each step runs as a job on whichever pump thread dequeues it; the
    /// driver awaits it on `host` and emits one [`StepReport`]. The sequence
    /// ends after `done`, `cancelled` or `raised`. If the consumer drops the
    /// stream, the computation gets one cancellation step and is dropped.
    ///
    /// The first call also attaches `host` to the scheduler so pump steps run
    /// inside that runtime's context.
    pub fn exec_on_queue<C>(&self, host: &Handle, computation: C) -> StepReports<C::Output>
    where
        C: Coroutine,
    {
        self.scheduler.attach_host(host);
        let (tx, rx) = mpsc::channel(REPORT_BUFFER);
        host.spawn(drive(self.clone(), computation, tx));
        StepReports { rx }
    }
}

async fn drive<C: Coroutine>(
    executor: QueueExecutor,
    computation: C,
    reports: mpsc::Sender<StepReport<C::Output>>,
) {
    let mut slot = Some(computation);

    while let Some(mut current) = slot.take() {
        let signal = if reports.is_closed() {
            Signal::Cancel
        } else {
            Signal::Resume
        };

        let submitted = executor.submit(move || {
            let step = current.resume(signal);
            Ok((current, step))
        });

        let report = match submitted {
            Ok(handle) => match handle.await {
                Ok((returned, step)) => {
                    slot = Some(returned);
                    StepReport::from_step(step)
                }
                Err(e) => StepReport::Raised {
                    exception: e.to_string(),
                },
            },
            Err(e) => {
                warn!(error = %e, "bridge step could not be queued");
                StepReport::Raised {
                    exception: e.to_string(),
                }
            }
        };

        if signal == Signal::Cancel {
            debug!(status = report.status(), "bridged computation dropped after cancellation");
            break;
        }

        let terminal = report.is_terminal();
        debug!(status = report.status(), "bridge step");
        // A failed send means the consumer is gone; the next pass cancels.
        let _ = reports.send(report).await;
        if terminal {
            break;
        }
    }
}
