//! Resumable computations stepped by the pump.
//!
//! A [`Coroutine`] is an explicit state machine: every call to
//! [`Coroutine::resume`] advances it from its last suspension point to the
//! next one and reports what happened as a [`Step`]. The scheduler never
//! relies on language-level coroutine machinery; native `async` blocks are
//! hosted through [`FutureCoroutine`].

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::wait::WaitTarget;

/// What the pump injects when resuming a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Plain resume with no injected value.
    Resume,
    /// Deliver cancellation at this resumption boundary.
    Cancel,
}

/// Outcome of a single resumption step.
#[derive(Debug)]
pub enum Step<T> {
    /// Finished with a value.
    Complete(T),
    /// Voluntarily relinquished control with nothing to wait on.
    Yield,
    /// Waiting on another awaitable.
    Block(WaitTarget),
    /// Observed cancellation during the step.
    Cancelled,
    /// Raised an error.
    Raise(Fault),
}

/// An error raised out of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Process-level abort; halts the pump that observed it.
    Interrupt(Interrupt),
    /// Ordinary failure, local to the task.
    Error(String),
}

impl Fault {
    pub fn error(message: impl fmt::Display) -> Self {
        Fault::Error(message.to_string())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Fault::Interrupt(_))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Interrupt(i) => write!(f, "interrupted: {i}"),
            Fault::Error(msg) => f.write_str(msg),
        }
    }
}

/// Unrecoverable signals surfaced through a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    /// Keyboard-style abort.
    Abort,
    /// Request to exit the process with the given code.
    Exit(i32),
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Abort => f.write_str("abort"),
            Interrupt::Exit(code) => write!(f, "exit with code {code}"),
        }
    }
}

/// A computation that can be advanced one step at a time.
///
/// Only one thread resumes a given computation at any moment: the pump
/// owns it while it is out of the queue.
pub trait Coroutine: Send + 'static {
    type Output: Send + 'static;

    fn resume(&mut self, signal: Signal) -> Step<Self::Output>;
}

impl<C> Coroutine for Box<C>
where
    C: Coroutine + ?Sized,
{
    type Output = C::Output;

    fn resume(&mut self, signal: Signal) -> Step<Self::Output> {
        (**self).resume(signal)
    }
}

// ── Closure adapter ─────────────────────────────────────────────────

/// Coroutine backed by a closure called once per step.
pub struct FromFn<F, T> {
    f: F,
    _output: PhantomData<fn() -> T>,
}

/// Build a [`Coroutine`] from a step closure.
///
/// ```ignore
/// let mut left = 2;
/// let c = from_fn(move |_| {
///     if left == 0 { return Step::Complete("done") }
///     left -= 1;
///     Step::Yield
/// });
/// ```
pub fn from_fn<T, F>(f: F) -> FromFn<F, T>
where
    F: FnMut(Signal) -> Step<T> + Send + 'static,
    T: Send + 'static,
{
    FromFn {
        f,
        _output: PhantomData,
    }
}

impl<F, T> Coroutine for FromFn<F, T>
where
    F: FnMut(Signal) -> Step<T> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn resume(&mut self, signal: Signal) -> Step<T> {
        (self.f)(signal)
    }
}

// ── Native futures ──────────────────────────────────────────────────

/// Hosts a `Future` as a coroutine.
///
/// Each resume polls the future once with a no-op waker. `Pending` is
/// reported as a cooperative yield, so the task is simply retried on its
/// next rotation. A cancel signal drops the future in place.
pub struct FutureCoroutine<F> {
    future: Option<Pin<Box<F>>>,
}

impl<F: Future> FutureCoroutine<F> {
    pub fn new(future: F) -> Self {
        Self {
            future: Some(Box::pin(future)),
        }
    }
}

impl<F> Coroutine for FutureCoroutine<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    type Output = F::Output;

    fn resume(&mut self, signal: Signal) -> Step<F::Output> {
        let Some(future) = self.future.as_mut() else {
            return Step::Raise(Fault::error("future resumed after it finished"));
        };

        if signal == Signal::Cancel {
            self.future = None;
            return Step::Cancelled;
        }

        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(value) => {
                self.future = None;
                Step::Complete(value)
            }
            Poll::Pending => Step::Yield,
        }
    }
}

/// A future that is pending exactly once.
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if !self.0 {
            self.0 = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        Poll::Ready(())
    }
}

/// Yield once back to the pump from inside a hosted future.
pub async fn yield_now() {
    YieldOnce(false).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fn_counts_down() {
        let mut left = 2;
        let mut c = from_fn(move |_| {
            if left == 0 {
                return Step::Complete("done");
            }
            left -= 1;
            Step::Yield
        });

        assert!(matches!(c.resume(Signal::Resume), Step::Yield));
        assert!(matches!(c.resume(Signal::Resume), Step::Yield));
        assert!(matches!(c.resume(Signal::Resume), Step::Complete("done")));
    }

    #[test]
    fn future_yields_once_per_yield_now() {
        let mut c = FutureCoroutine::new(async {
            yield_now().await;
            yield_now().await;
            42
        });

        assert!(matches!(c.resume(Signal::Resume), Step::Yield));
        assert!(matches!(c.resume(Signal::Resume), Step::Yield));
        assert!(matches!(c.resume(Signal::Resume), Step::Complete(42)));
        assert!(matches!(c.resume(Signal::Resume), Step::Raise(Fault::Error(_))));
    }

    #[test]
    fn future_drops_on_cancel() {
        let mut c = FutureCoroutine::new(async {
            yield_now().await;
            1
        });

        assert!(matches!(c.resume(Signal::Resume), Step::Yield));
        assert!(matches!(c.resume(Signal::Cancel), Step::Cancelled));
    }

    #[test]
    fn fault_classification() {
        assert!(Fault::Interrupt(Interrupt::Abort).is_fatal());
        assert!(!Fault::error("nope").is_fatal());
        assert_eq!(Fault::Interrupt(Interrupt::Exit(3)).to_string(), "interrupted: exit with code 3");
    }
}
