//! Parallel aggregation pipeline
//!
//! A single reader thread parses records and groups them into batches, a
//! bounded queue hands the batches to a pool of workers, and each worker
//! folds its batches into partial aggregates merged into a shared
//! [`Aggregator`].
//!
//! # Module Structure
//!
//! - `types`: Batch and pipeline configuration
//! - `queue`: Bounded hand-off between the reader and the workers
//! - `batching`: Batcher and the reader thread
//! - `worker`: Worker pool with per-worker fault containment
//! - `tracker`: Partial aggregates and the thread-safe aggregator
//! - `processor`: Main ParallelProcessor orchestration

mod batching;
mod processor;
mod queue;
mod tracker;
mod types;
mod worker;

pub use batching::{Batcher, ProducerReport};
pub use processor::{ParallelProcessor, RunOutcome};
pub use queue::{BatchQueue, PushError};
pub use tracker::{AggregateSnapshot, Aggregator, PartialAggregate};
pub use types::{Batch, ParallelConfig, ParseErrorPolicy, DEFAULT_BATCH_SIZE, DEFAULT_WORKERS};
pub use worker::{WorkerPool, WorkerReport};
