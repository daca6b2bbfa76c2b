use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("chunk_size must be greater than 0")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Returned instead of an outcome when a cancellation request was observed
/// between chunks. The partial outcome is discarded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Extraction was interrupted by a cancellation request")]
pub struct Interrupted;
