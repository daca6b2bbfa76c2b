use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::events::TaskEvent;
use super::pool::Shared;
use super::task::{TaskFlags, WorkItem};

const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Handed to every callable the runner executes.
///
/// The callable reports progress through it and polls it for cancellation
/// and pause requests; the runner never interrupts a callable on its own.
pub struct TaskContext<T> {
    id: String,
    flags: Arc<TaskFlags>,
    shared: Arc<Shared<T>>,
}

impl<T> TaskContext<T> {
    pub(crate) fn new(id: String, flags: Arc<TaskFlags>, shared: Arc<Shared<T>>) -> Self {
        Self { id, flags, shared }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle sharing this item's flags.
    pub fn work_item(&self) -> WorkItem {
        WorkItem::new(self.id.clone(), Arc::clone(&self.flags))
    }

    /// Reports progress. The percentage is clamped to `0..=100`.
    ///
    /// Reports made after a cancellation request are dropped.
    pub fn report_progress(&self, percent: i64, message: &str) {
        if self.flags.is_cancel_requested() {
            return;
        }

        let percent = percent.clamp(0, 100) as u8;
        let mut table = self.shared.lock_table();
        if let Some(entry) = table.entries.get_mut(&self.id) {
            entry.progress = percent;
            entry.message = message.to_string();
        }
        self.shared.events.publish(TaskEvent::Progress {
            id: self.id.clone(),
            percent,
            message: message.to_string(),
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.is_cancel_requested()
    }

    pub fn is_paused(&self) -> bool {
        self.flags.is_pause_requested()
    }

    /// Blocks while the item is paused. Returns early when cancelled.
    pub fn wait_if_paused(&self) {
        while self.flags.is_pause_requested() && !self.flags.is_cancel_requested() {
            thread::sleep(PAUSE_POLL_INTERVAL);
        }
    }
}
