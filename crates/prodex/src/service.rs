//! Runs the extraction pipeline on the task runner.
//!
//! The runner knows nothing about extraction and the pipeline knows nothing
//! about threads; this module wires the two together, enforces the file size
//! limit and optionally streams progress and persists outcomes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{info, warn};

use crate::broadcast::ExtractionProgressBroadcaster;
use crate::config::Config;
use crate::error::ServiceError;
use crate::pipeline::{
    BroadcastProgress, CancellationCheck, ExtractionOperation, ExtractionOutcome, Extractor,
    PipelineConfig, ProgressEvent, ProgressReporter, TeeProgress,
};
use crate::sanitize;
use crate::storage::ResultStore;
use crate::worker::{TaskContext, TaskError, TaskEvent, TaskRunner, TaskState, WorkItem};

impl<T: Send + Sync> ProgressReporter for TaskContext<T> {
    fn report(&self, event: ProgressEvent) {
        self.report_progress(i64::from(event.percent), &event.message);
    }
}

impl<T: Send + Sync> CancellationCheck for TaskContext<T> {
    fn is_cancelled(&self) -> bool {
        TaskContext::is_cancelled(self)
    }

    fn wait_if_paused(&self) {
        TaskContext::wait_if_paused(self)
    }
}

pub struct ExtractionService {
    runner: TaskRunner<ExtractionOutcome>,
    extractor: Arc<Extractor>,
    operation: Arc<dyn ExtractionOperation>,
    max_file_size: u64,
    broadcaster: Option<ExtractionProgressBroadcaster>,
    store: Option<Arc<ResultStore>>,
}

impl ExtractionService {
    /// Builds a runner with `general.max_workers` threads.
    pub fn new(
        config: &Config,
        operation: Arc<dyn ExtractionOperation>,
    ) -> Result<Self, ServiceError> {
        let extractor = Extractor::new(Arc::new(PipelineConfig::from_config(config)))?;
        let runner = TaskRunner::new(config.general.max_workers)?;

        Ok(Self {
            runner,
            extractor: Arc::new(extractor),
            operation,
            max_file_size: config.extraction.max_file_size,
            broadcaster: None,
            store: None,
        })
    }

    /// Streams pipeline progress of every submitted document.
    pub fn with_broadcaster(mut self, broadcaster: ExtractionProgressBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Saves every finished outcome to `store`.
    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Queues a document for extraction under `document_id`.
    ///
    /// Files above `extraction.max_file_size` are rejected up front. A
    /// missing file is not an error here; it yields a failed outcome.
    pub fn submit<P: AsRef<Path>>(
        &self,
        document_id: &str,
        path: P,
    ) -> Result<WorkItem, ServiceError> {
        let path = path.as_ref().to_path_buf();

        if let Ok(metadata) = std::fs::metadata(&path) {
            if metadata.len() > self.max_file_size {
                return Err(ServiceError::FileTooLarge {
                    path,
                    size: metadata.len(),
                    limit: self.max_file_size,
                });
            }
        }

        let filename = sanitize::redact_path(&path);
        let tracker = self
            .broadcaster
            .as_ref()
            .map(|b| b.start_document(document_id, &filename));
        let extractor = Arc::clone(&self.extractor);
        let operation = Arc::clone(&self.operation);
        let store = self.store.clone();
        let id = document_id.to_string();

        let item = self.runner.submit_and_start(
            move |ctx: &TaskContext<ExtractionOutcome>| {
                let broadcast = tracker.map(BroadcastProgress::from_tracker);
                let result = match &broadcast {
                    Some(broadcast) => {
                        let tee = TeeProgress::new(ctx, broadcast);
                        extractor.extract(&id, &path, operation.as_ref(), &tee, ctx)
                    }
                    None => extractor.extract(&id, &path, operation.as_ref(), ctx, ctx),
                };
                let outcome = result.map_err(|_| TaskError::Cancelled)?;
                // A cancel that lands during the last chunk discards the outcome
                if ctx.is_cancelled() {
                    return Err(TaskError::Cancelled);
                }

                if let Some(store) = &store {
                    if let Err(e) = store.save(&outcome) {
                        warn!(document_id = %id, "Failed to save extraction result: {}", e);
                    }
                }
                Ok(outcome)
            },
            Some(document_id.to_string()),
        )?;

        info!(document_id = %document_id, filename = %filename, "Submitted document for extraction");
        Ok(item)
    }

    pub fn cancel(&self, document_id: &str) -> bool {
        self.runner.cancel(document_id)
    }

    pub fn cancel_all(&self) -> usize {
        self.runner.cancel_all()
    }

    pub fn pause(&self, document_id: &str) -> bool {
        self.runner.pause(document_id)
    }

    pub fn resume(&self, document_id: &str) -> bool {
        self.runner.resume(document_id)
    }

    pub fn status(&self, document_id: &str) -> Option<TaskState> {
        self.runner.status(document_id)
    }

    pub fn subscribe(&self) -> Receiver<TaskEvent<ExtractionOutcome>> {
        self.runner.subscribe()
    }

    pub fn wait_for_all(&self, timeout: Option<Duration>) -> bool {
        self.runner.wait_for_all(timeout)
    }

    pub fn runner(&self) -> &TaskRunner<ExtractionOutcome> {
        &self.runner
    }

    /// Stops the runner and joins its threads.
    pub fn shutdown(self) {
        self.runner.shutdown();
        self.runner.wait();
    }
}
