//! Error types for the aggregation pipeline
//!
//! Fatal conditions (the input cannot be opened or read, or a parse error
//! under the abort policy) surface as [`PipelineError`]. Per-line and
//! per-worker problems are contained: [`ParseError`] and [`WorkerFault`] are
//! reported and counted, and the run carries on.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fatal errors that end a run without a result
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input could not be opened; nothing was processed
    #[error("cannot open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line failed to parse and the run is configured to abort
    #[error("parse error at {0}")]
    Parse(#[from] ParseError),

    /// Reading failed after the input was opened
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A pipeline thread could not be started or joined
    #[error("{0} thread terminated unexpectedly")]
    Thread(&'static str),
}

/// One input line that is not a JSON object
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number in the input
    pub line: usize,
    pub message: String,
}

/// A record field holding a value of the wrong JSON type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("field '{field}' has type {found}, expected {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// A worker that panicked while folding a batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("worker #{worker_id} failed on batch {batch_id}: {message}")]
pub struct WorkerFault {
    pub worker_id: usize,
    pub batch_id: u64,
    pub message: String,
}

impl PipelineError {
    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }
}

/// Item-level failure from a record source
#[derive(Error, Debug)]
pub enum SourceError {
    /// The line was read but is not a record; reading can continue
    #[error("parse error at {0}")]
    Parse(#[from] ParseError),

    /// The underlying reader failed; the source is exhausted
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SourceError> for PipelineError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Parse(e) => PipelineError::Parse(e),
            SourceError::Io(e) => PipelineError::Io(e),
        }
    }
}
