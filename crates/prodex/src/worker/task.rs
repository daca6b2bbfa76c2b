use std::error::Error as StdError;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::context::TaskContext;

/// Lifecycle state of a work item tracked by the runner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl TaskState {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Queued, running or paused items occupy the runner.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskState::Queued | TaskState::Running | TaskState::Paused
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Idle => write!(f, "Idle"),
            TaskState::Queued => write!(f, "Queued"),
            TaskState::Running => write!(f, "Running"),
            TaskState::Completed => write!(f, "Completed"),
            TaskState::Failed => write!(f, "Failed"),
            TaskState::Cancelled => write!(f, "Cancelled"),
            TaskState::Paused => write!(f, "Paused"),
        }
    }
}

/// Cooperative flags shared between the runner and the running callable.
#[derive(Debug, Default)]
pub(crate) struct TaskFlags {
    cancel: AtomicBool,
    pause: AtomicBool,
}

impl TaskFlags {
    pub(crate) fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.pause.store(paused, Ordering::Release);
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub(crate) fn is_pause_requested(&self) -> bool {
        self.pause.load(Ordering::Acquire)
    }
}

/// Handle to a submitted unit of work.
///
/// Cloning the handle is cheap; all clones observe the same cooperative flags.
#[derive(Debug, Clone)]
pub struct WorkItem {
    id: String,
    flags: Arc<TaskFlags>,
}

impl WorkItem {
    pub(crate) fn new(id: String, flags: Arc<TaskFlags>) -> Self {
        Self { id, flags }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.flags.is_cancel_requested()
    }

    pub fn is_pause_requested(&self) -> bool {
        self.flags.is_pause_requested()
    }
}

/// Error returned by a submitted callable.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The callable observed a cancellation request and stopped early.
    #[error("Task was cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }

    /// Formats the error and its source chain, one cause per line.
    pub fn trace(&self) -> String {
        let mut trace = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            let _ = write!(trace, "\ncaused by: {}", cause);
            source = cause.source();
        }
        trace
    }
}

/// Boxed callable executed on a pool thread.
pub type TaskFn<T> = Box<dyn FnOnce(&TaskContext<T>) -> Result<T, TaskError> + Send + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Error, Debug)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Idle.is_terminal());
        assert!(!TaskState::Paused.is_terminal());
    }

    #[test]
    fn test_active_states() {
        assert!(TaskState::Queued.is_active());
        assert!(TaskState::Running.is_active());
        assert!(TaskState::Paused.is_active());
        assert!(!TaskState::Idle.is_active());
        assert!(!TaskState::Completed.is_active());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&TaskState::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }

    #[test]
    fn test_work_item_observes_shared_flags() {
        let flags = Arc::new(TaskFlags::default());
        let item = WorkItem::new("task-1".to_string(), Arc::clone(&flags));
        let clone = item.clone();

        assert!(!item.is_cancel_requested());
        flags.request_cancel();
        assert!(clone.is_cancel_requested());

        flags.set_paused(true);
        assert!(item.is_pause_requested());
        flags.set_paused(false);
        assert!(!item.is_pause_requested());
    }

    #[test]
    fn test_trace_includes_source_chain() {
        let err = Outer {
            inner: std::io::Error::new(std::io::ErrorKind::NotFound, "missing file"),
        };
        let task_err = TaskError::from(Box::new(err) as Box<dyn StdError + Send + Sync>);

        let trace = task_err.trace();
        assert!(trace.starts_with("outer failure"));
        assert!(trace.contains("caused by: missing file"));
    }

    #[test]
    fn test_failed_trace_is_message() {
        let err = TaskError::failed("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.trace(), "boom");
    }
}
