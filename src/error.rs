// Tue Jan 13 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid stage registration: {0}")]
    Registry(String),
    #[error("Failed to spawn {unit}: {source}")]
    Spawn {
        unit: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Worker {worker} of stage '{stage}' faulted: {message}")]
    WorkerFault {
        stage: String,
        worker: usize,
        message: String,
    },
    #[error("Sink failed: {0}")]
    Sink(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl FlowError {
    pub fn is_worker_fault(&self) -> bool {
        matches!(self, FlowError::WorkerFault { .. })
    }
}

/// Error a stage transform returns for a single record.
///
/// `Item` drops the record and counts it as an error; `Fatal` brings the whole
/// run down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("item failed: {0}")]
    Item(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl StageError {
    pub fn item(reason: impl Into<String>) -> Self {
        StageError::Item(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        StageError::Fatal(reason.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StageError::Fatal(_))
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
