//! Scheduler Module
//!
//! Funnels every upstream call through one FIFO queue drained at a bounded
//! rate, so bursts of concurrent page loads become a smooth request stream.

mod limiter;
mod task;

pub use limiter::{Scheduler, SchedulerSnapshot};
pub use task::{QueuedTask, TaskOutcome};
