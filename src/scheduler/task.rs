//! Queued task definitions.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future produced when a task is dispatched.
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskOutcome> + Send>>;

/// What the drain loop learns about a finished task.
///
/// The typed result travels to the caller separately; this only feeds logs
/// and counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
}

/// A pending upstream call, owned by the scheduler until dispatched.
pub struct QueuedTask {
    pub id: u64,
    execute: Box<dyn FnOnce() -> TaskFuture + Send>,
}

impl QueuedTask {
    pub fn new<F>(id: u64, execute: F) -> Self
    where
        F: FnOnce() -> TaskFuture + Send + 'static,
    {
        Self {
            id,
            execute: Box::new(execute),
        }
    }

    /// Consumes the task, producing the future that performs it.
    pub fn dispatch(self) -> TaskFuture {
        (self.execute)()
    }
}

impl fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedTask").field("id", &self.id).finish()
    }
}
