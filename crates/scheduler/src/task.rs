//! Tasks: one resumable computation plus its result slot.
//!
//! The submitter keeps a [`TaskHandle`]; the queue holds the type-erased
//! [`Resumable`] cell that owns the computation. Because the computation
//! moves with the queue entry, whichever pump dequeued it is the only one
//! that can resume it or write its result.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::completion::{Completion, SlotState};
use crate::coroutine::{Coroutine, Fault, Signal, Step};
use crate::error::TaskError;
use crate::wait::{Awaitable, WaitTarget};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Monotonically assigned task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// State shared between a handle and the task cell.
pub(crate) struct TaskCore<T> {
    id: TaskId,
    completion: Completion<T>,
}

impl<T: Send + 'static> Awaitable for TaskCore<T> {
    fn is_ready(&self) -> bool {
        self.completion.is_done()
    }

    fn task_id(&self) -> Option<TaskId> {
        Some(self.id)
    }

    fn describe(&self) -> String {
        format!("{} ({:?})", self.id, self.completion.state())
    }
}

/// Submitter-side handle with future semantics.
///
/// Dropping the handle does not cancel the task.
pub struct TaskHandle<T> {
    core: Arc<TaskCore<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Send + 'static> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.core.id
    }

    pub fn state(&self) -> SlotState {
        self.core.completion.state()
    }

    pub fn is_done(&self) -> bool {
        self.core.completion.is_done()
    }

    pub fn is_cancelled(&self) -> bool {
        self.core.completion.is_cancelled()
    }

    /// Cancel the task.
    ///
    /// The slot becomes cancelled immediately. The computation receives a
    /// [`Signal::Cancel`] at its next turn in the queue and is then dropped.
    /// Returns `false` if the task had already finished.
    pub fn cancel(&self) -> bool {
        let cancelled = self.core.completion.cancel();
        if cancelled {
            debug!(task = %self.core.id, "cancellation requested");
        }
        cancelled
    }

    pub fn error(&self) -> Option<TaskError> {
        self.core.completion.error()
    }

    /// Reference other computations can block on.
    pub fn wait_target(&self) -> WaitTarget {
        WaitTarget::new(self.core.clone())
    }
}

impl<T: Clone + Send + 'static> TaskHandle<T> {
    /// Non-blocking read; [`TaskError::NotReady`] while pending.
    pub fn result(&self) -> Result<T, TaskError> {
        self.core.completion.result()
    }
}

impl<T: Send + 'static> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.core.id)
            .field("state", &self.state())
            .finish()
    }
}

// ── Erased task cell ────────────────────────────────────────────────

/// What one resumption did. A completed value is already stored.
#[derive(Debug)]
pub(crate) enum Outcome {
    Completed,
    Cancelled,
    Raised(Fault),
    Panicked(String),
    Blocking(WaitTarget),
    Yielding,
}

/// A task as the queue sees it, independent of its output type.
pub(crate) trait Resumable: Send {
    fn id(&self) -> TaskId;

    /// The slot was cancelled from the handle side.
    fn cancel_requested(&self) -> bool;

    fn resume(&mut self, signal: Signal) -> Outcome;

    /// Record a failure. `false` if the slot was already terminal.
    fn fail(&self, error: TaskError) -> bool;

    /// Record cancellation. `false` if the slot was already terminal.
    fn mark_cancelled(&self) -> bool;

    fn waiting_on(&self) -> Option<&WaitTarget>;

    fn set_waiting_on(&mut self, target: Option<WaitTarget>);
}

struct TaskCell<C: Coroutine> {
    core: Arc<TaskCore<C::Output>>,
    computation: C,
    waiting_on: Option<WaitTarget>,
}

/// Wrap a computation in a fresh task.
pub(crate) fn new_task<C: Coroutine>(computation: C) -> (Box<dyn Resumable>, TaskHandle<C::Output>) {
    let core = Arc::new(TaskCore {
        id: TaskId::next(),
        completion: Completion::new(),
    });
    let handle = TaskHandle {
        core: Arc::clone(&core),
    };
    let cell = TaskCell {
        core,
        computation,
        waiting_on: None,
    };
    (Box::new(cell), handle)
}

impl<C: Coroutine> Resumable for TaskCell<C> {
    fn id(&self) -> TaskId {
        self.core.id
    }

    fn cancel_requested(&self) -> bool {
        self.core.completion.is_cancelled()
    }

    fn resume(&mut self, signal: Signal) -> Outcome {
        let computation = &mut self.computation;
        let step = panic::catch_unwind(AssertUnwindSafe(|| computation.resume(signal)));

        match step {
            Ok(Step::Complete(value)) => {
                if !self.core.completion.set_result(value) {
                    debug!(task = %self.core.id, "value discarded, slot already terminal");
                }
                Outcome::Completed
            }
            Ok(Step::Yield) => Outcome::Yielding,
            Ok(Step::Block(target)) => Outcome::Blocking(target),
            Ok(Step::Cancelled) => Outcome::Cancelled,
            Ok(Step::Raise(fault)) => Outcome::Raised(fault),
            Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
        }
    }

    fn fail(&self, error: TaskError) -> bool {
        self.core.completion.set_exception(error)
    }

    fn mark_cancelled(&self) -> bool {
        self.core.completion.cancel()
    }

    fn waiting_on(&self) -> Option<&WaitTarget> {
        self.waiting_on.as_ref()
    }

    fn set_waiting_on(&mut self, target: Option<WaitTarget>) {
        self.waiting_on = target;
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::from_fn;

    #[test]
    fn ids_are_monotonic() {
        let a = TaskId::next();
        let b = TaskId::next();
        assert!(b > a);
        assert_eq!(a.to_string(), format!("task-{}", a.as_u64()));
    }

    #[test]
    fn completed_value_lands_in_handle() {
        let (mut cell, handle) = new_task(from_fn(|_| Step::Complete(5u32)));
        assert_eq!(handle.result(), Err(TaskError::NotReady));

        assert!(matches!(cell.resume(Signal::Resume), Outcome::Completed));
        assert_eq!(handle.result(), Ok(5));
        assert_eq!(cell.id(), handle.id());
    }

    #[test]
    fn panic_becomes_outcome() {
        let (mut cell, _handle) = new_task(from_fn(|_| -> Step<()> { panic!("kaboom") }));
        match cell.resume(Signal::Resume) {
            Outcome::Panicked(msg) => assert_eq!(msg, "kaboom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn handle_cancel_is_visible_to_cell() {
        let (cell, handle) = new_task(from_fn(|_| Step::<()>::Yield));
        assert!(handle.cancel());
        assert!(cell.cancel_requested());
        assert!(!cell.mark_cancelled());
        assert!(!handle.cancel());
    }

    #[test]
    fn wait_target_points_at_task() {
        let (_cell, handle) = new_task(from_fn(|_| Step::<()>::Yield));
        let target = handle.wait_target();
        assert!(target.is_task(handle.id()));
        assert!(!target.is_ready());
    }
}
