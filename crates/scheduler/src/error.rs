use thiserror::Error;

use crate::coroutine::Interrupt;
use crate::task::TaskId;

/// Terminal failure recorded in a task's result slot.
///
/// `NotReady` is the only variant that is not terminal: it is what a read
/// returns while the slot is still pending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("result is not ready yet")]
    NotReady,

    #[error("task was cancelled")]
    Cancelled,

    #[error("{0} is awaiting itself")]
    SelfWait(TaskId),

    #[error("task failed: {0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task interrupted: {0}")]
    Interrupted(Interrupt),
}

impl TaskError {
    /// Ordinary failures stay local to the task; interrupts also halt the pump.
    pub fn is_ordinary(&self) -> bool {
        matches!(
            self,
            TaskError::Failed(_) | TaskError::Panicked(_) | TaskError::SelfWait(_)
        )
    }
}

/// Errors that escape the pump procedure itself.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("{task} raised a fatal interrupt: {interrupt}")]
    Interrupted { task: TaskId, interrupt: Interrupt },

    #[error("failed to spawn pump thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("pump thread panicked: {0}")]
    Crashed(String),
}

/// Submission refused by a bounded queue running the `reject` overflow policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

/// Failure delivered through a [`JobHandle`](crate::bridge::JobHandle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("job was dropped before it ran")]
    Abandoned,
}

/// Errors raised while loading or validating a [`SchedulerConfig`](crate::types::SchedulerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
