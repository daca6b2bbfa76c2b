pub mod context;
pub mod events;
pub mod pool;
pub mod task;

pub use context::TaskContext;
pub use events::{TaskEvent, TaskEventBus};
pub use pool::TaskRunner;
pub use task::{TaskError, TaskFn, TaskState, WorkItem};

// Re-export crossbeam_channel so subscribers can name receiver and error types
pub use crossbeam_channel;
