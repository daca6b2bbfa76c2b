//! Notification delivery for the task runner.
//!
//! Every subscriber owns its own unbounded queue and drains it on whatever
//! thread it likes, so events are never dropped and never block the pool.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::task::TaskState;

/// Lifecycle notification emitted by the runner.
#[derive(Debug)]
pub enum TaskEvent<T> {
    Started {
        id: String,
    },
    Progress {
        id: String,
        percent: u8,
        message: String,
    },
    Result {
        id: String,
        value: Arc<T>,
    },
    Error {
        id: String,
        message: String,
        trace: String,
    },
    StatusChanged {
        id: String,
        state: TaskState,
    },
    Cancelled {
        id: String,
    },
    /// Emitted exactly once per submitted item, last.
    Finished {
        id: String,
    },
    GlobalProgress {
        completed: usize,
        total: usize,
    },
    AllFinished,
}

// Manual impl: deriving would require `T: Clone`, but the value sits behind an Arc.
impl<T> Clone for TaskEvent<T> {
    fn clone(&self) -> Self {
        match self {
            TaskEvent::Started { id } => TaskEvent::Started { id: id.clone() },
            TaskEvent::Progress {
                id,
                percent,
                message,
            } => TaskEvent::Progress {
                id: id.clone(),
                percent: *percent,
                message: message.clone(),
            },
            TaskEvent::Result { id, value } => TaskEvent::Result {
                id: id.clone(),
                value: Arc::clone(value),
            },
            TaskEvent::Error { id, message, trace } => TaskEvent::Error {
                id: id.clone(),
                message: message.clone(),
                trace: trace.clone(),
            },
            TaskEvent::StatusChanged { id, state } => TaskEvent::StatusChanged {
                id: id.clone(),
                state: *state,
            },
            TaskEvent::Cancelled { id } => TaskEvent::Cancelled { id: id.clone() },
            TaskEvent::Finished { id } => TaskEvent::Finished { id: id.clone() },
            TaskEvent::GlobalProgress { completed, total } => TaskEvent::GlobalProgress {
                completed: *completed,
                total: *total,
            },
            TaskEvent::AllFinished => TaskEvent::AllFinished,
        }
    }
}

impl<T> TaskEvent<T> {
    /// The work item this event concerns, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            TaskEvent::Started { id }
            | TaskEvent::Progress { id, .. }
            | TaskEvent::Result { id, .. }
            | TaskEvent::Error { id, .. }
            | TaskEvent::StatusChanged { id, .. }
            | TaskEvent::Cancelled { id }
            | TaskEvent::Finished { id } => Some(id),
            TaskEvent::GlobalProgress { .. } | TaskEvent::AllFinished => None,
        }
    }
}

/// Fan-out of task events to any number of subscribers.
pub struct TaskEventBus<T> {
    subscribers: Mutex<Vec<Sender<TaskEvent<T>>>>,
}

impl<T> TaskEventBus<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber. Events published before this call are not replayed.
    pub fn subscribe(&self) -> Receiver<TaskEvent<T>> {
        let (sender, receiver) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Sends an event to every live subscriber, pruning dropped receivers.
    pub fn publish(&self, event: TaskEvent<T>) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T> Default for TaskEventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
