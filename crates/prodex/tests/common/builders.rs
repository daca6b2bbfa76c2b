//! Builders and stub operations for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use prodex::config::{Config, ExtractionConfig};
use prodex::pipeline::{ExtractionOperation, OperationError, PartialResult};

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Small chunks and two workers so tests stay fast.
    pub fn new() -> Self {
        let mut config = Config::default();
        config.general.max_workers = 2;
        config.extraction.chunk_size = 100;
        config.extraction.chunk_overlap = 10;
        Self { config }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.config.general.max_workers = count;
        self
    }

    pub fn chunking(mut self, size: usize, overlap: usize) -> Self {
        self.config.extraction.chunk_size = size;
        self.config.extraction.chunk_overlap = overlap;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.extraction.max_file_size = bytes;
        self
    }

    pub fn validate_results(mut self, enabled: bool) -> Self {
        self.config.extraction.validate_results = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns one relation per chunk carrying the chunk text.
pub struct EchoOperation;

impl ExtractionOperation for EchoOperation {
    fn extract(
        &self,
        chunk: &str,
        _config: &ExtractionConfig,
    ) -> Result<PartialResult, OperationError> {
        Ok(PartialResult::new().with_relations(vec![json!({
            "relation_type": "compatible_with",
            "related_product": chunk,
            "context": "echo",
        })]))
    }
}

/// Records every chunk it sees and fails on the calls listed in `fail_on`
/// (1-based).
pub struct RecordingOperation {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
    pub chunks: Mutex<Vec<String>>,
}

impl RecordingOperation {
    pub fn new() -> Self {
        Self::failing_on(Vec::new())
    }

    pub fn failing_on(fail_on: Vec<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on,
            chunks: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.chunks.lock().unwrap().clone()
    }
}

impl ExtractionOperation for RecordingOperation {
    fn extract(
        &self,
        chunk: &str,
        _config: &ExtractionConfig,
    ) -> Result<PartialResult, OperationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.chunks.lock().unwrap().push(chunk.to_string());

        if self.fail_on.contains(&call) {
            return Err(format!("call {} failed", call).into());
        }
        Ok(PartialResult::new()
            .with_relations(vec![json!({ "call": call })])
            .with_specifications(vec![json!({ "call": call })]))
    }
}

/// Sleeps before answering, so tests can act while a chunk is in flight.
pub struct SlowOperation {
    pub delay: Duration,
}

impl ExtractionOperation for SlowOperation {
    fn extract(
        &self,
        _chunk: &str,
        _config: &ExtractionConfig,
    ) -> Result<PartialResult, OperationError> {
        std::thread::sleep(self.delay);
        Ok(PartialResult::new().with_relations(vec![json!({ "slow": true })]))
    }
}

pub fn shared<O: ExtractionOperation + 'static>(op: O) -> Arc<dyn ExtractionOperation> {
    Arc::new(op)
}
