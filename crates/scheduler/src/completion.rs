//! Write-once result slot shared between a submitter and the pump.
//!
//! A [`Completion`] starts pending and moves to exactly one terminal state:
//! a value, an error, or cancelled. Later transitions are refused and
//! reported back to the caller as `false`, so a terminal slot never changes.

use std::fmt;

use parking_lot::Mutex;

use crate::error::TaskError;

/// Observable state of a [`Completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl SlotState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SlotState::Pending)
    }
}

enum Slot<T> {
    Pending,
    Value(T),
    Error(TaskError),
    Cancelled,
}

impl<T> Slot<T> {
    fn state(&self) -> SlotState {
        match self {
            Slot::Pending => SlotState::Pending,
            Slot::Value(_) => SlotState::Completed,
            Slot::Error(_) => SlotState::Failed,
            Slot::Cancelled => SlotState::Cancelled,
        }
    }
}

/// A result holder with future-like state transitions.
///
/// Reads never block: [`Completion::result`] returns
/// [`TaskError::NotReady`] while the slot is pending.
pub struct Completion<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
        }
    }

    /// Record the value. Returns `false` if the slot was already terminal.
    pub fn set_result(&self, value: T) -> bool {
        self.settle(Slot::Value(value))
    }

    /// Record a failure. Returns `false` if the slot was already terminal.
    pub fn set_exception(&self, error: TaskError) -> bool {
        self.settle(Slot::Error(error))
    }

    /// Mark the slot cancelled. Returns `false` if the slot was already terminal.
    pub fn cancel(&self) -> bool {
        self.settle(Slot::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Cancelled)
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn state(&self) -> SlotState {
        self.slot.lock().state()
    }

    /// The recorded failure, if the slot ended in one.
    pub fn error(&self) -> Option<TaskError> {
        match &*self.slot.lock() {
            Slot::Error(e) => Some(e.clone()),
            _ => None,
        }
    }

    fn settle(&self, next: Slot<T>) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = next;
        true
    }
}

impl<T: Clone> Completion<T> {
    /// Read the terminal result without consuming it.
    pub fn result(&self) -> Result<T, TaskError> {
        match &*self.slot.lock() {
            Slot::Pending => Err(TaskError::NotReady),
            Slot::Value(v) => Ok(v.clone()),
            Slot::Error(e) => Err(e.clone()),
            Slot::Cancelled => Err(TaskError::Cancelled),
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("state", &self.state())
            .finish()
    }
}
