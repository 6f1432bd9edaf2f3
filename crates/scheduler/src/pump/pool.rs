use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use crate::error::PumpError;
use crate::task::panic_message;

use super::Scheduler;

/// Named threads each running [`Scheduler::pump_busy_loop`] on a shared scheduler.
pub struct PumpPool {
    handles: Vec<thread::JoinHandle<Result<(), PumpError>>>,
}

impl PumpPool {
    /// Start `threads` pump threads.
    pub fn spawn(scheduler: Arc<Scheduler>, threads: usize) -> Result<Self, PumpError> {
        let mut handles = Vec::with_capacity(threads);
        for id in 0..threads {
            let scheduler = Arc::clone(&scheduler);
            let handle = thread::Builder::new()
                .name(format!("pile-pump-{id}"))
                .spawn(move || {
                    info!(pump = id, "pump thread started");
                    let result = scheduler.pump_busy_loop();
                    match &result {
                        Ok(()) => info!(pump = id, steps = scheduler.steps(), "pump thread stopped"),
                        Err(e) => error!(pump = id, error = %e, "pump thread halted by error"),
                    }
                    result
                })?;
            handles.push(handle);
        }
        Ok(Self { handles })
    }

    /// Start as many threads as the scheduler's config asks for.
    pub fn from_config(scheduler: Arc<Scheduler>) -> Result<Self, PumpError> {
        let threads = scheduler.config().resolved_pump_threads();
        Self::spawn(scheduler, threads)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every pump thread to exit.
    ///
    /// Returns the first error any thread ended with. Threads only exit
    /// after a shutdown request or a fatal interrupt.
    pub fn join(self) -> Result<(), PumpError> {
        let mut first_error = None;
        for handle in self.handles {
            let result = match handle.join() {
                Ok(result) => result,
                Err(payload) => Err(PumpError::Crashed(panic_message(payload.as_ref()))),
            };
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
