use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::broadcast::extraction_progress::{ExtractionProgressEvent, ExtractionProgressTracker};

use super::outcome::ExtractionStatus;

/// Progress notification emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub status: ExtractionStatus,
    /// Always within `0..=100`.
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(status: ExtractionStatus, percent: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Polled by the pipeline between chunks.
pub trait CancellationCheck: Send + Sync {
    fn is_cancelled(&self) -> bool;

    /// Blocks while a pause is requested. The default never pauses.
    fn wait_if_paused(&self) {}
}

/// No-op reporter and never-cancelled check, for unit tests and callers
/// that do not track progress.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

impl CancellationCheck for NoopProgress {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancellationCheck for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// Forwards pipeline events to an extraction progress broadcast channel.
pub struct BroadcastProgress {
    tracker: ExtractionProgressTracker,
}

impl BroadcastProgress {
    pub fn new(
        document_id: &str,
        filename: &str,
        sender: Arc<broadcast::Sender<ExtractionProgressEvent>>,
    ) -> Self {
        Self {
            tracker: ExtractionProgressTracker::new(document_id, filename, sender),
        }
    }

    pub fn from_tracker(tracker: ExtractionProgressTracker) -> Self {
        Self { tracker }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        if event.status == ExtractionStatus::Failed {
            self.tracker.failed(&event.message);
        } else {
            self.tracker
                .update(event.status, event.percent, &event.message);
        }
    }
}

/// Sends every event to two reporters.
pub struct TeeProgress<'a> {
    first: &'a dyn ProgressReporter,
    second: &'a dyn ProgressReporter,
}

impl<'a> TeeProgress<'a> {
    pub fn new(first: &'a dyn ProgressReporter, second: &'a dyn ProgressReporter) -> Self {
        Self { first, second }
    }
}

impl ProgressReporter for TeeProgress<'_> {
    fn report(&self, event: ProgressEvent) {
        self.first.report(event.clone());
        self.second.report(event);
    }
}
