use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::sanitize;

use super::chunker::Chunker;
use super::config::PipelineConfig;
use super::context::ExtractionContext;
use super::error::{Interrupted, PipelineError};
use super::merge;
use super::operation::ExtractionOperation;
use super::outcome::{ExtractionOutcome, ExtractionStatus};
use super::progress::{CancellationCheck, ProgressEvent, ProgressReporter};

/// Percent reported when the first chunk starts.
const CHUNKS_START: usize = 20;
/// Share of the progress bar spent on chunks.
const CHUNKS_SPAN: usize = 60;

pub struct Extractor {
    config: Arc<PipelineConfig>,
    chunker: Chunker,
}

impl Extractor {
    /// Fails when the chunk settings could never advance through a document.
    pub fn new(config: Arc<PipelineConfig>) -> Result<Self, PipelineError> {
        let chunker = Chunker::new(config.chunk_size(), config.chunk_overlap())?;
        Ok(Self { config, chunker })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Extracts one document.
    ///
    /// Per-chunk failures and I/O problems end up in the outcome's error
    /// list. Only a cancellation request observed between chunks makes this
    /// return `Err(Interrupted)`.
    pub fn extract(
        &self,
        document_id: &str,
        path: &Path,
        operation: &dyn ExtractionOperation,
        progress: &dyn ProgressReporter,
        cancel: &dyn CancellationCheck,
    ) -> Result<ExtractionOutcome, Interrupted> {
        let filename = sanitize::redact_path(path);
        let _span = info_span!("extraction",
            document_id = %document_id,
            filename = %filename,
        )
        .entered();

        let mut ctx = ExtractionContext::new(document_id, path.to_path_buf());
        ctx.outcome.set_status(ExtractionStatus::InProgress);
        progress.report(ProgressEvent::new(
            ExtractionStatus::InProgress,
            0,
            "Starting extraction",
        ));

        // Step 1: Check the file exists
        {
            let _step = info_span!("check_file").entered();
            if !ctx.path.is_file() {
                ctx.outcome
                    .add_error(format!("File not found: {}", ctx.path.display()));
                return Ok(self.finish(ctx, progress));
            }
        }

        // Step 2: Read content
        {
            let _step = info_span!("read_content").entered();
            progress.report(ProgressEvent::new(
                ExtractionStatus::InProgress,
                10,
                "Reading file content...",
            ));
            if !self.step_read_content(&mut ctx) {
                return Ok(self.finish(ctx, progress));
            }
        }

        // Step 3: Chunk and run the operation
        {
            let _step = info_span!("process_chunks").entered();
            self.step_process_chunks(&mut ctx, operation, progress, cancel)?;
        }

        // Step 4: Merge partial results
        {
            let _step = info_span!("merge_results").entered();
            ctx.outcome.set_status(ExtractionStatus::MergingResults);
            progress.report(ProgressEvent::new(
                ExtractionStatus::MergingResults,
                80,
                "Merging results...",
            ));
            self.step_merge(&mut ctx);
        }

        // Step 5: Settle the status
        self.step_settle_status(&mut ctx);

        // Step 6: Validate
        if let Some(rules) = &self.config.validation {
            if matches!(
                ctx.outcome.status,
                ExtractionStatus::Completed | ExtractionStatus::PartiallyCompleted
            ) {
                let _step = info_span!("validate").entered();
                progress.report(ProgressEvent::new(
                    ExtractionStatus::Validating,
                    90,
                    "Validating results...",
                ));
                let problems = rules.validate(&ctx.outcome);
                if problems.is_empty() {
                    ctx.outcome.set_status(ExtractionStatus::Validated);
                } else {
                    for problem in problems {
                        ctx.outcome
                            .add_error(format!("Validation error: {}", problem));
                    }
                    ctx.outcome.set_status(ExtractionStatus::ValidationFailed);
                }
            }
        }

        Ok(self.finish(ctx, progress))
    }

    /// Returns false when the outcome already failed.
    fn step_read_content(&self, ctx: &mut ExtractionContext) -> bool {
        let bytes = match std::fs::read(&ctx.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read document: {}", e);
                ctx.outcome
                    .add_error(format!("Unexpected error while reading file: {}", e));
                return false;
            }
        };
        ctx.outcome.metadata.file_size = Some(bytes.len() as u64);

        match String::from_utf8(bytes) {
            Ok(content) => {
                ctx.content = Some(content);
                true
            }
            Err(e) => {
                warn!("Document is not valid UTF-8: {}", e);
                ctx.outcome.add_error(format!(
                    "Unexpected error while reading file: content is not valid UTF-8 ({})",
                    e.utf8_error()
                ));
                false
            }
        }
    }

    fn step_process_chunks(
        &self,
        ctx: &mut ExtractionContext,
        operation: &dyn ExtractionOperation,
        progress: &dyn ProgressReporter,
        cancel: &dyn CancellationCheck,
    ) -> Result<(), Interrupted> {
        let content = ctx.content.take().unwrap_or_default();
        let chunked = self.chunker.needs_chunking(&content);
        let chunks = self.chunker.split(&content);
        let total = chunks.len();

        ctx.outcome.metadata.chunked = chunked;
        ctx.outcome.metadata.chunks_count = total;
        ctx.outcome.set_status(ExtractionStatus::ProcessingChunks);
        if chunked {
            info!("Document split into {} chunks", total);
        }

        for (i, chunk) in chunks.iter().enumerate() {
            cancel.wait_if_paused();
            if cancel.is_cancelled() {
                info!("Extraction cancelled before chunk {}/{}", i + 1, total);
                return Err(Interrupted);
            }

            let _chunk_span = info_span!("chunk", chunk = i + 1).entered();
            let percent = CHUNKS_START + CHUNKS_SPAN * i / total;
            let message = if chunked {
                format!("Processing chunk {}/{}", i + 1, total)
            } else {
                "Processing document".to_string()
            };
            progress.report(ProgressEvent::new(
                ExtractionStatus::ProcessingChunks,
                percent as u8,
                message,
            ));

            // Only chunked documents say which chunk a message came from
            let prefix = if chunked {
                format!("Chunk {}: ", i + 1)
            } else {
                String::new()
            };

            match operation.extract(chunk, &self.config.extraction) {
                Ok(mut partial) => {
                    for error in partial.errors.drain(..) {
                        ctx.outcome.add_error(format!("{}{}", prefix, error));
                    }
                    for warning in partial.warnings.drain(..) {
                        ctx.outcome.add_warning(format!("{}{}", prefix, warning));
                    }
                    ctx.partials.push(partial);
                }
                Err(e) => {
                    warn!("Extraction operation failed: {}", e);
                    ctx.failed_chunks += 1;
                    ctx.outcome.add_error(format!("{}{}", prefix, e));
                }
            }
        }

        Ok(())
    }

    fn step_merge(&self, ctx: &mut ExtractionContext) {
        let partials = &ctx.partials;
        ctx.outcome.compatibility = merge::merge_compatibility(partials.iter().map(|p| &p.compatibility));
        ctx.outcome.technical = merge::merge_technical(partials.iter().map(|p| &p.technical));
        ctx.outcome.faq_data = merge::merge_faq(partials.iter().map(|p| &p.faq_data));

        debug!(
            relations = ctx.outcome.compatibility_count(),
            specifications = ctx.outcome.technical_count(),
            "Merged partial results"
        );
    }

    fn step_settle_status(&self, ctx: &mut ExtractionContext) {
        let total = ctx.outcome.metadata.chunks_count;
        let status = if ctx.outcome.errors().is_empty() {
            ExtractionStatus::Completed
        } else if total > 0 && ctx.failed_chunks == total {
            ExtractionStatus::Failed
        } else if ctx.outcome.has_payload() {
            ExtractionStatus::PartiallyCompleted
        } else {
            ExtractionStatus::Failed
        };
        ctx.outcome.set_status(status);
    }

    /// Emits the terminal progress event and stamps the duration.
    fn finish(&self, ctx: ExtractionContext, progress: &dyn ProgressReporter) -> ExtractionOutcome {
        let outcome = ctx.finish();

        let message = match outcome.status {
            ExtractionStatus::Failed => outcome
                .errors()
                .first()
                .cloned()
                .unwrap_or_else(|| "Extraction failed".to_string()),
            ExtractionStatus::PartiallyCompleted => format!(
                "Extraction partially completed with {} error(s)",
                outcome.errors().len()
            ),
            ExtractionStatus::ValidationFailed => format!(
                "Extraction finished with {} validation error(s)",
                outcome.errors().len()
            ),
            _ => "Extraction completed".to_string(),
        };
        progress.report(ProgressEvent::new(outcome.status, 100, message));

        info!(
            status = %outcome.status,
            relations = outcome.compatibility_count(),
            specifications = outcome.technical_count(),
            errors = outcome.errors().len(),
            duration_ms = outcome.metadata.processing_time_ms.unwrap_or_default(),
            "Extraction finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::pipeline::operation::PartialResult;
    use crate::pipeline::progress::NoopProgress;
    use serde_json::json;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn extractor(chunk_size: usize, overlap: usize) -> Extractor {
        let extraction = ExtractionConfig {
            chunk_size,
            chunk_overlap: overlap,
            ..ExtractionConfig::default()
        };
        Extractor::new(Arc::new(PipelineConfig::from_extraction(extraction))).unwrap()
    }

    fn validating_extractor() -> Extractor {
        let extraction = ExtractionConfig {
            chunk_size: 10,
            chunk_overlap: 0,
            validate_results: true,
            ..ExtractionConfig::default()
        };
        Extractor::new(Arc::new(PipelineConfig::from_extraction(extraction))).unwrap()
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    /// One relation per chunk, carrying the chunk text.
    fn echo_op(chunk: &str, _config: &ExtractionConfig) -> Result<PartialResult, String> {
        Ok(PartialResult::new().with_relations(vec![json!({ "text": chunk })]))
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for Recorder {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_rejects_bad_chunk_settings() {
        let extraction = ExtractionConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..ExtractionConfig::default()
        };
        let result = Extractor::new(Arc::new(PipelineConfig::from_extraction(extraction)));
        assert!(matches!(
            result,
            Err(PipelineError::OverlapTooLarge { .. })
        ));
    }

    #[test]
    fn test_missing_file_fails_fast() {
        let tmp = TempDir::new().unwrap();
        let calls = AtomicUsize::new(0);
        let op = |_: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(PartialResult::new())
        };

        let outcome = extractor(10, 0)
            .extract(
                "doc",
                &tmp.path().join("missing.txt"),
                &op,
                &NoopProgress,
                &NoopProgress,
            )
            .unwrap();

        assert_eq!(outcome.status, ExtractionStatus::Failed);
        assert_eq!(outcome.errors().len(), 1);
        assert!(outcome.errors()[0].starts_with("File not found: "));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_short_document_is_single_unprefixed_chunk() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "short.txt", "hello");
        let op = |chunk: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            Ok(PartialResult::new()
                .with_relations(vec![json!({ "text": chunk })])
                .with_warning("low confidence"))
        };

        let outcome = extractor(10, 2)
            .extract("doc", &path, &op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.status, ExtractionStatus::Completed);
        assert!(!outcome.metadata.chunked);
        assert_eq!(outcome.metadata.chunks_count, 1);
        assert_eq!(outcome.metadata.file_size, Some(5));
        assert_eq!(outcome.warnings(), ["low confidence"]);
        assert_eq!(outcome.relations(), [json!({ "text": "hello" })]);
        assert!(outcome.metadata.processing_time_ms.is_some());
    }

    #[test]
    fn test_chunked_document_merges_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "long.txt", "abcdefghijklmnopq");

        let outcome = extractor(10, 3)
            .extract("doc", &path, &echo_op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.status, ExtractionStatus::Completed);
        assert!(outcome.metadata.chunked);
        assert_eq!(outcome.metadata.chunks_count, 2);
        assert_eq!(
            outcome.compatibility,
            json!({ "relations": [{ "text": "abcdefghij" }, { "text": "hijklmnopq" }] })
        );
        assert_eq!(outcome.technical, json!({ "specifications": [] }));
    }

    #[test]
    fn test_middle_chunk_failure_is_partial() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "three.txt", &"x".repeat(30));
        let calls = AtomicUsize::new(0);
        let op = |_: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            if i == 1 {
                Err("model timed out".to_string())
            } else {
                Ok(PartialResult::new().with_relations(vec![json!({ "chunk": i })]))
            }
        };

        let outcome = extractor(10, 0)
            .extract("doc", &path, &op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.metadata.chunks_count, 3);
        assert_eq!(outcome.status, ExtractionStatus::PartiallyCompleted);
        assert_eq!(outcome.errors(), ["Chunk 2: model timed out"]);
        assert_eq!(outcome.compatibility_count(), 2);
    }

    #[test]
    fn test_chunk_warnings_and_reported_errors_are_prefixed() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "three.txt", &"y".repeat(30));
        let calls = AtomicUsize::new(0);
        let op = |_: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            let partial = PartialResult::new().with_relations(vec![json!({ "chunk": i })]);
            if i == 1 {
                Ok(partial
                    .with_warning("low confidence")
                    .with_error("missing context"))
            } else {
                Ok(partial)
            }
        };

        let outcome = extractor(10, 0)
            .extract("doc", &path, &op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.metadata.chunks_count, 3);
        assert_eq!(outcome.errors(), ["Chunk 2: missing context"]);
        assert_eq!(outcome.warnings(), ["Chunk 2: low confidence"]);
        assert_eq!(outcome.status, ExtractionStatus::PartiallyCompleted);
        assert_eq!(outcome.compatibility_count(), 3);
    }

    #[test]
    fn test_all_chunks_failing_is_failed() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "bad.txt", &"x".repeat(25));
        let op = |_: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            Err("unreachable backend".to_string())
        };

        let outcome = extractor(10, 0)
            .extract("doc", &path, &op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.status, ExtractionStatus::Failed);
        assert_eq!(
            outcome.errors(),
            [
                "Chunk 1: unreachable backend",
                "Chunk 2: unreachable backend",
                "Chunk 3: unreachable backend"
            ]
        );
    }

    #[test]
    fn test_reported_errors_without_payload_fail() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "doc.txt", "short");
        let op = |_: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            Ok(PartialResult::new().with_error("could not parse model output"))
        };

        let outcome = extractor(10, 0)
            .extract("doc", &path, &op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.status, ExtractionStatus::Failed);
        assert_eq!(outcome.errors(), ["could not parse model output"]);
    }

    #[test]
    fn test_empty_file_completes_with_empty_payload() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "empty.txt", "");
        let op = |_: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            Ok(PartialResult::new())
        };

        let outcome = extractor(10, 0)
            .extract("doc", &path, &op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.status, ExtractionStatus::Completed);
        assert_eq!(outcome.metadata.file_size, Some(0));
        assert_eq!(outcome.metadata.chunks_count, 1);
        assert!(outcome.relations().is_empty());
        assert!(outcome.specifications().is_empty());
        assert!(outcome.errors().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_recorded_not_raised() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("binary.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let outcome = extractor(10, 0)
            .extract("doc", &path, &echo_op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.status, ExtractionStatus::Failed);
        assert!(outcome.errors()[0].starts_with("Unexpected error while reading file"));
    }

    #[test]
    fn test_cancellation_between_chunks_interrupts() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "long.txt", &"x".repeat(50));
        let cancel = AtomicBool::new(false);
        let calls = AtomicUsize::new(0);
        let op = |_: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                cancel.store(true, Ordering::SeqCst);
            }
            Ok(PartialResult::new())
        };

        let result = extractor(10, 0).extract("doc", &path, &op, &NoopProgress, &cancel);

        assert_eq!(result, Err(Interrupted));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_progress_phases() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "doc.txt", &"x".repeat(40));
        let recorder = Recorder::default();

        extractor(10, 0)
            .extract("doc", &path, &echo_op, &recorder, &NoopProgress)
            .unwrap();

        let events = recorder.0.into_inner().unwrap();
        let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![0, 10, 20, 35, 50, 65, 80, 100]);
        assert_eq!(events[3].message, "Processing chunk 2/4");
        assert_eq!(events[6].status, ExtractionStatus::MergingResults);
        assert_eq!(events[7].status, ExtractionStatus::Completed);
        // Percentages never go backwards
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_validation_passes() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "doc.txt", "short");
        let op = |_: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            Ok(PartialResult::new().with_specifications(vec![json!({
                "category": "power",
                "name": "Voltage",
                "raw_value": "230 V"
            })]))
        };

        let outcome = validating_extractor()
            .extract("doc", &path, &op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.status, ExtractionStatus::Validated);
    }

    #[test]
    fn test_validation_failure_adds_prefixed_errors() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "doc.txt", "short");
        let op = |_: &str, _: &ExtractionConfig| -> Result<PartialResult, String> {
            Ok(PartialResult::new().with_specifications(vec![json!({ "name": "Voltage" })]))
        };

        let outcome = validating_extractor()
            .extract("doc", &path, &op, &NoopProgress, &NoopProgress)
            .unwrap();

        assert_eq!(outcome.status, ExtractionStatus::ValidationFailed);
        assert_eq!(
            outcome.errors(),
            [
                "Validation error: Specification 1 is missing required field 'category'",
                "Validation error: Specification 1 is missing required field 'raw_value'"
            ]
        );
    }

    #[test]
    fn test_operation_receives_extraction_config() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "doc.txt", "short");
        let op = |_: &str, config: &ExtractionConfig| -> Result<PartialResult, String> {
            assert_eq!(config.chunk_size, 10);
            assert!(config.compatibility.enabled);
            Ok(PartialResult::new())
        };

        let outcome = extractor(10, 0)
            .extract("doc", &path, &op, &NoopProgress, &NoopProgress)
            .unwrap();
        assert_eq!(outcome.status, ExtractionStatus::Completed);
    }
}
