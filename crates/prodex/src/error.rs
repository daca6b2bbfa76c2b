use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProdexError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Unsupported config file extension: {0}")]
    UnsupportedFormat(String),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode result '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("A task with id '{0}' is already tracked")]
    DuplicateTask(String),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("File '{path}' is {size} bytes, exceeding the limit of {limit} bytes")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("Failed to bridge log records into tracing: {0}")]
    LogBridge(#[source] log::SetLoggerError),
}

pub type Result<T> = std::result::Result<T, ProdexError>;
