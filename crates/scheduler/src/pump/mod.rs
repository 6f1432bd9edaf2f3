//! Queue scheduler -- submission, the pump procedure, and shutdown.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, submission, shutdown, and accessors
//! - `stepping`: `pump_single` / `pump_busy_loop` and outcome handling
//! - `pool`: owned pump threads

mod core;
mod pool;
mod stepping;

pub use self::core::Scheduler;
pub use self::pool::PumpPool;
pub use self::stepping::PumpStatus;
