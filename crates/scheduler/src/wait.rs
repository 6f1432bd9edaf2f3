//! References to the object a blocked computation is waiting on.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::completion::Completion;
use crate::task::TaskId;

/// Anything a computation can block on.
pub trait Awaitable: Send + Sync {
    /// Whether the awaited object has reached a terminal state.
    fn is_ready(&self) -> bool;

    /// Identity of the task behind this awaitable, if it is one.
    fn task_id(&self) -> Option<TaskId> {
        None
    }

    /// Short label used in logs and status records.
    fn describe(&self) -> String;
}

impl<T: Send + 'static> Awaitable for Completion<T> {
    fn is_ready(&self) -> bool {
        self.is_done()
    }

    fn describe(&self) -> String {
        format!("completion ({:?})", self.state())
    }
}

/// Cloneable reference carried by a blocking step.
#[derive(Clone)]
pub struct WaitTarget(Arc<dyn Awaitable>);

impl WaitTarget {
    pub fn new(awaitable: Arc<dyn Awaitable>) -> Self {
        Self(awaitable)
    }

    pub fn is_ready(&self) -> bool {
        self.0.is_ready()
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.0.task_id()
    }

    /// Whether this target is the task with the given id.
    pub fn is_task(&self, id: TaskId) -> bool {
        self.task_id() == Some(id)
    }
}

impl<A: Awaitable + 'static> From<Arc<A>> for WaitTarget {
    fn from(awaitable: Arc<A>) -> Self {
        Self(awaitable)
    }
}

impl fmt::Debug for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WaitTarget").field(&self.0.describe()).finish()
    }
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.describe())
    }
}

impl Serialize for WaitTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_target_tracks_readiness() {
        let completion = Arc::new(Completion::<u8>::new());
        let target = WaitTarget::from(Arc::clone(&completion));

        assert!(!target.is_ready());
        assert_eq!(target.task_id(), None);

        completion.set_result(1);
        assert!(target.is_ready());
        assert_eq!(target.to_string(), "completion (Completed)");
    }

    #[test]
    fn serializes_as_label() {
        let target = WaitTarget::from(Arc::new(Completion::<()>::new()));
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json, serde_json::json!("completion (Pending)"));
    }
}
