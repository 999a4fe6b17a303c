// Core library for ndstat: streaming aggregate statistics over NDJSON

pub mod cancel;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod decompression;
pub mod error;
pub mod parallel;
pub mod parsers;
pub mod platform;
pub mod record;
pub mod report;
pub mod source;
pub mod stats;
pub mod tty;

pub use cancel::CancelToken;
pub use config::StatConfig;
pub use error::{FieldError, ParseError, PipelineError, Result, SourceError, WorkerFault};
pub use parallel::{
    AggregateSnapshot, Aggregator, ParallelConfig, ParallelProcessor, ParseErrorPolicy,
    PartialAggregate, RunOutcome,
};
pub use record::{AuthStatus, Record};
pub use source::{filter_by_auth, RecordSource, SourceStats};
pub use stats::ProcessingStats;
