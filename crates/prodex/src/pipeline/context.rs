use std::path::PathBuf;
use std::time::Instant;

use super::operation::PartialResult;
use super::outcome::ExtractionOutcome;

/// State carried through the steps of one extraction run.
pub struct ExtractionContext {
    // Input
    pub document_id: String,
    pub path: PathBuf,

    // Built up step by step, handed back to the caller at the end
    pub outcome: ExtractionOutcome,

    // Set by step_read_content
    pub content: Option<String>,

    // One entry per chunk whose operation call returned Ok, in chunk order
    pub partials: Vec<PartialResult>,

    // Chunks whose operation call returned Err
    pub failed_chunks: usize,

    pub started: Instant,
}

impl ExtractionContext {
    pub fn new(document_id: &str, path: PathBuf) -> Self {
        let mut outcome = ExtractionOutcome::new(document_id);
        outcome.metadata.file_path = Some(path.display().to_string());

        Self {
            document_id: document_id.to_string(),
            path,
            outcome,
            content: None,
            partials: Vec::new(),
            failed_chunks: 0,
            started: Instant::now(),
        }
    }

    /// Stamps the elapsed time and yields the outcome.
    pub fn finish(mut self) -> ExtractionOutcome {
        let elapsed = self.started.elapsed().as_millis();
        self.outcome.metadata.processing_time_ms = Some(u64::try_from(elapsed).unwrap_or(u64::MAX));
        self.outcome
    }
}
