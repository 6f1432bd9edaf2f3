//! Cooperative task scheduler over a single shared work queue.
//!
//! Resumable computations ([`Coroutine`]) are wrapped in tasks and stepped
//! one resumption at a time by pump threads. Blocked and yielding tasks go
//! back to the tail of the queue; a task waiting on itself fails instead of
//! spinning. [`QueueExecutor`] adapts the scheduler to a job-executor shape
//! and can drive a computation on behalf of a tokio host.

pub mod bridge;
pub mod completion;
pub mod coroutine;
pub mod error;
pub mod metrics;
pub mod pump;
pub(crate) mod queue;
pub mod task;
pub mod types;
pub mod wait;

pub use bridge::{JobHandle, QueueExecutor, StepReport, StepReports};
pub use completion::{Completion, SlotState};
pub use coroutine::{from_fn, yield_now, Coroutine, Fault, FutureCoroutine, Interrupt, Signal, Step};
pub use error::{ConfigError, JobError, PumpError, SubmitError, TaskError};
pub use metrics::{ErrorRecord, PumpMetrics};
pub use pump::{PumpPool, PumpStatus, Scheduler};
pub use task::{TaskHandle, TaskId};
pub use types::{BlockPolicy, OverflowPolicy, SchedulerConfig};
pub use wait::{Awaitable, WaitTarget};
