//! Broadcasting modules for real-time event streaming.
//!
//! These broadcasters feed UI-like consumers (progress bars, log panels)
//! through `tokio::sync::broadcast` channels.

pub mod extraction_progress;
pub mod log_broadcaster;

pub use extraction_progress::{
    ExtractionProgressBroadcaster, ExtractionProgressEvent, ExtractionProgressTracker,
};
pub use log_broadcaster::{LogBroadcastLayer, LogBroadcaster, LogEvent};
