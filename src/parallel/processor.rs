//! Main parallel processor
//!
//! Contains the ParallelProcessor struct that orchestrates the pipeline:
//! one reader thread feeding a bounded queue, a pool of workers draining it,
//! and a shared aggregator read once everyone has been joined.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::cancel::CancelToken;
use crate::error::{PipelineError, Result, WorkerFault};
use crate::parsers::JsonlParser;
use crate::source::RecordSource;
use crate::stats::ProcessingStats;

use super::batching::{reader_thread, Batcher};
use super::queue::BatchQueue;
use super::tracker::{AggregateSnapshot, Aggregator, PartialAggregate};
use super::types::{Batch, ParallelConfig};
use super::worker::WorkerPool;

type Folder = dyn Fn(&Batch) -> PartialAggregate + Send + Sync;

/// Result of a run that was not stopped by a fatal error
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub snapshot: AggregateSnapshot,
    pub stats: ProcessingStats,
    pub faults: Vec<WorkerFault>,
    /// The run was cancelled before every batch was merged
    pub cancelled: bool,
}

impl RunOutcome {
    /// True when the aggregate does not cover the whole input
    pub fn is_partial(&self) -> bool {
        self.cancelled || self.stats.batches_lost > 0
    }
}

/// Main parallel processor
pub struct ParallelProcessor {
    config: ParallelConfig,
    folder: Option<Arc<Folder>>,
}

impl std::fmt::Debug for ParallelProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelProcessor")
            .field("config", &self.config)
            .field("custom_folder", &self.folder.is_some())
            .finish()
    }
}

impl ParallelProcessor {
    pub fn new(config: ParallelConfig) -> Self {
        Self {
            config,
            folder: None,
        }
    }

    /// Replace the per-batch fold used by the workers
    pub fn with_folder<F>(mut self, folder: F) -> Self
    where
        F: Fn(&Batch) -> PartialAggregate + Send + Sync + 'static,
    {
        self.folder = Some(Arc::new(folder));
        self
    }

    /// Aggregate a file (or `-` for stdin)
    ///
    /// An input that cannot be opened fails before any thread is started.
    pub fn run<P: AsRef<Path>>(&self, path: P, cancel: &CancelToken) -> Result<RunOutcome> {
        self.config
            .validate()
            .map_err(PipelineError::InvalidConfig)?;
        let source = RecordSource::open(path, cancel.clone())?;
        self.run_source(source, cancel)
    }

    /// Aggregate JSON lines from any reader
    pub fn run_reader<R: BufRead + Send + 'static>(
        &self,
        reader: R,
        cancel: &CancelToken,
    ) -> Result<RunOutcome> {
        let source = RecordSource::from_reader(reader, Box::new(JsonlParser::new()), cancel.clone());
        self.run_source(source, cancel)
    }

    /// Aggregate an already opened source
    pub fn run_source(&self, source: RecordSource, cancel: &CancelToken) -> Result<RunOutcome> {
        self.config
            .validate()
            .map_err(PipelineError::InvalidConfig)?;

        let start = Instant::now();
        let queue = Arc::new(BatchQueue::new(self.config.effective_queue_capacity()));
        let aggregator = Arc::new(Aggregator::new());

        let pool = self.spawn_workers(&queue, &aggregator, cancel)?;
        tracing::info!(
            workers = pool.len(),
            batch_size = self.config.batch_size,
            queue_capacity = queue.capacity(),
            "pipeline started"
        );

        let batcher = Batcher::new(source, self.config.batch_size, self.config.on_parse_error);
        let reader_handle = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("ndstat-reader".to_string())
                .spawn(move || reader_thread(batcher, queue, cancel))
        };
        let reader_handle = match reader_handle {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "failed to start reader");
                queue.complete();
                pool.join();
                return Err(PipelineError::Thread("reader"));
            }
        };

        // Producer first, then close the queue so workers drain and exit.
        // A failed reader empties the queue before closing it so idle workers
        // exit without folding batches whose results would be discarded.
        let produced = match reader_handle.join() {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                let dropped = queue.drain();
                queue.complete();
                tracing::debug!(error = %e, dropped, "reader failed, discarding partial results");
                pool.join();
                return Err(e);
            }
            Err(_) => {
                queue.drain();
                queue.complete();
                pool.join();
                return Err(PipelineError::Thread("reader"));
            }
        };
        queue.complete();

        let reports = pool.join();
        let leftover = queue.drain();
        let snapshot = aggregator.snapshot();
        let faults: Vec<WorkerFault> = reports.iter().filter_map(|r| r.fault.clone()).collect();

        let accounted = snapshot.batches_merged + faults.len() as u64;
        let cancelled = produced.cancelled
            || (cancel.is_cancelled() && accounted < produced.batches_pushed);

        let stats = ProcessingStats {
            lines_read: produced.source.lines_read,
            blank_lines: produced.source.blank_lines,
            parse_errors: produced.source.parse_errors,
            batches_pushed: produced.batches_pushed,
            records_parsed: produced.records_pushed,
            batches_merged: snapshot.batches_merged,
            batches_lost: produced
                .batches_pushed
                .saturating_sub(snapshot.batches_merged),
            worker_faults: faults.len(),
            workers: reports.len(),
            processing_time: start.elapsed(),
        };

        if cancelled {
            tracing::info!(
                merged = snapshot.batches_merged,
                discarded = leftover,
                "run cancelled, reporting partial aggregate"
            );
        } else {
            tracing::info!(
                records = snapshot.record_count,
                batches = snapshot.batches_merged,
                abandoned = produced.abandoned,
                elapsed_ms = stats.processing_time.as_millis() as u64,
                "pipeline finished"
            );
        }

        Ok(RunOutcome {
            snapshot,
            stats,
            faults,
            cancelled,
        })
    }

    fn spawn_workers(
        &self,
        queue: &Arc<BatchQueue>,
        aggregator: &Arc<Aggregator>,
        cancel: &CancelToken,
    ) -> Result<WorkerPool> {
        let count = self.config.num_workers;
        match &self.folder {
            Some(folder) => {
                let folder = folder.clone();
                WorkerPool::spawn_with(
                    count,
                    queue.clone(),
                    aggregator.clone(),
                    cancel.clone(),
                    move |batch: &Batch| folder(batch),
                )
            }
            None => WorkerPool::spawn(count, queue.clone(), aggregator.clone(), cancel.clone()),
        }
    }
}
