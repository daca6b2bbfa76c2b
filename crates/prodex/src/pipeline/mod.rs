pub mod chunker;
pub mod config;
pub mod context;
pub mod error;
pub mod merge;
pub mod operation;
pub mod outcome;
pub mod progress;
pub mod runner;
pub mod validation;

pub use chunker::Chunker;
pub use config::PipelineConfig;
pub use context::ExtractionContext;
pub use error::{Interrupted, PipelineError};
pub use operation::{ExtractionOperation, OperationError, PartialResult};
pub use outcome::{ExtractionOutcome, ExtractionStatus, OutcomeMetadata};
pub use progress::{
    BroadcastProgress, CancellationCheck, NoopProgress, ProgressEvent, ProgressReporter,
    TeeProgress,
};
pub use runner::Extractor;
pub use validation::ValidationRules;
