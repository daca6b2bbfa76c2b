pub mod broadcast;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod service;
pub mod storage;
pub mod worker;

pub use broadcast::{ExtractionProgressBroadcaster, ExtractionProgressEvent, LogBroadcaster};
pub use config::{load_config, Config, ExtractionConfig};
pub use error::{
    ConfigError, LoggingError, ProdexError, Result, ServiceError, StorageError, WorkerError,
};
pub use logging::init_tracing;
pub use pipeline::{
    Chunker, ExtractionOperation, ExtractionOutcome, ExtractionStatus, Extractor, PartialResult,
    PipelineConfig, PipelineError,
};
pub use service::ExtractionService;
pub use storage::ResultStore;
pub use worker::{TaskContext, TaskError, TaskEvent, TaskRunner, TaskState, WorkItem};
