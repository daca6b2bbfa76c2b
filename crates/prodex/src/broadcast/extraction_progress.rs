//! Extraction progress broadcaster for real-time status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::pipeline::ExtractionStatus;

/// Progress event for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionProgressEvent {
    pub document_id: String,
    /// File name only, never the full path.
    pub filename: String,
    pub status: ExtractionStatus,
    pub percent: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionProgressEvent {
    pub fn new(
        document_id: &str,
        filename: &str,
        status: ExtractionStatus,
        percent: u8,
        message: &str,
    ) -> Self {
        Self {
            document_id: document_id.to_string(),
            filename: filename.to_string(),
            status,
            percent: percent.min(100),
            message: message.to_string(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn failed(document_id: &str, filename: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(
                document_id,
                filename,
                ExtractionStatus::Failed,
                100,
                "Extraction failed",
            )
        }
    }
}

/// Broadcasts extraction progress events for streaming.
#[derive(Clone)]
pub struct ExtractionProgressBroadcaster {
    sender: Arc<broadcast::Sender<ExtractionProgressEvent>>,
}

impl ExtractionProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: ExtractionProgressEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExtractionProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one document and announces it as queued.
    pub fn start_document(&self, document_id: &str, filename: &str) -> ExtractionProgressTracker {
        let tracker =
            ExtractionProgressTracker::new(document_id, filename, Arc::clone(&self.sender));
        tracker.update(ExtractionStatus::Queued, 0, "Queued for extraction");
        tracker
    }

    pub fn sender(&self) -> Arc<broadcast::Sender<ExtractionProgressEvent>> {
        Arc::clone(&self.sender)
    }
}

impl Default for ExtractionProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single document.
pub struct ExtractionProgressTracker {
    document_id: String,
    filename: String,
    sender: Arc<broadcast::Sender<ExtractionProgressEvent>>,
}

impl ExtractionProgressTracker {
    pub fn new(
        document_id: &str,
        filename: &str,
        sender: Arc<broadcast::Sender<ExtractionProgressEvent>>,
    ) -> Self {
        Self {
            document_id: document_id.to_string(),
            filename: filename.to_string(),
            sender,
        }
    }

    pub fn update(&self, status: ExtractionStatus, percent: u8, message: &str) {
        let event = ExtractionProgressEvent::new(
            &self.document_id,
            &self.filename,
            status,
            percent,
            message,
        );
        let _ = self.sender.send(event);
    }

    pub fn failed(&self, error: &str) {
        let event = ExtractionProgressEvent::failed(&self.document_id, &self.filename, error);
        let _ = self.sender.send(event);
    }
}
