//! Type definitions for parallel processing
//!
//! Contains the batch type moved through the queue and the pipeline
//! configuration.

use clap::ValueEnum;

use crate::record::Record;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_WORKERS: usize = 20;

/// What the reader does with a line that is not a record
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParseErrorPolicy {
    /// Report the line as a warning and keep reading
    #[default]
    Skip,
    /// Fail the whole run on the first bad line
    Abort,
}

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    pub num_workers: usize,
    pub batch_size: usize,
    /// Batches allowed in flight between reader and workers; defaults to `num_workers`
    pub queue_capacity: Option<usize>,
    pub on_parse_error: ParseErrorPolicy,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: None,
            on_parse_error: ParseErrorPolicy::Skip,
        }
    }
}

impl ParallelConfig {
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.num_workers).max(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.num_workers == 0 {
            return Err("worker count must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch size must be at least 1".to_string());
        }
        if self.queue_capacity == Some(0) {
            return Err("queue capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

/// A group of records handed to one worker as a unit
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    /// Input line of the first record
    pub start_line: usize,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
