//! Shared FIFO work queue.
//!
//! Backed by a crossbeam MPMC channel so any number of producers and pump
//! threads can push and pop without blocking. Both ends live in the queue,
//! so the channel never disconnects.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::task::Resumable;

/// How a plain job finished, for the pump's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JobRun {
    Ran,
    /// The paired handle was gone before the job started.
    Skipped,
    Failed(String),
}

/// A zero-step unit of work: invoked once, never re-enqueued.
pub(crate) type Job = Box<dyn FnOnce() -> JobRun + Send>;

/// One queue slot.
pub(crate) enum Entry {
    Task(Box<dyn Resumable>),
    Job(Job),
}

pub(crate) struct WorkQueue {
    tx: Sender<Entry>,
    rx: Receiver<Entry>,
    capacity: Option<usize>,
}

impl WorkQueue {
    /// `capacity == 0` means unbounded.
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx, capacity) = if capacity == 0 {
            let (tx, rx) = channel::unbounded();
            (tx, rx, None)
        } else {
            let (tx, rx) = channel::bounded(capacity);
            (tx, rx, Some(capacity))
        };
        Self { tx, rx, capacity }
    }

    /// Append at the back. Hands the entry back if the queue is full.
    pub(crate) fn push(&self, entry: Entry) -> Result<(), Entry> {
        self.tx.try_send(entry).map_err(|e| match e {
            TrySendError::Full(entry) | TrySendError::Disconnected(entry) => entry,
        })
    }

    /// Take from the front without blocking.
    pub(crate) fn pop(&self) -> Option<Entry> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }

    pub(crate) fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(tag: &'static str) -> Entry {
        Entry::Job(Box::new(move || JobRun::Failed(tag.to_string())))
    }

    fn run(entry: Entry) -> JobRun {
        match entry {
            Entry::Job(job) => job(),
            Entry::Task(_) => panic!("expected a job"),
        }
    }

    #[test]
    fn fifo_order() {
        let q = WorkQueue::new(0);
        for tag in ["a", "b", "c"] {
            assert!(q.push(job(tag)).is_ok());
        }
        assert_eq!(q.len(), 3);

        let order: Vec<JobRun> = std::iter::from_fn(|| q.pop()).map(run).collect();
        assert_eq!(
            order,
            vec![
                JobRun::Failed("a".into()),
                JobRun::Failed("b".into()),
                JobRun::Failed("c".into()),
            ]
        );
        assert!(q.pop().is_none());
    }

    #[test]
    fn bounded_hands_back_overflow() {
        let q = WorkQueue::new(1);
        assert_eq!(q.capacity(), Some(1));
        assert!(q.push(job("kept")).is_ok());

        let rejected = q.push(job("spilled")).err().expect("queue should be full");
        assert_eq!(run(rejected), JobRun::Failed("spilled".into()));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn unbounded_has_no_capacity() {
        assert_eq!(WorkQueue::new(0).capacity(), None);
    }
}
