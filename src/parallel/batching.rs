//! Batcher and reader thread logic for parallel processing
//!
//! The [`Batcher`] turns the record stream into fixed-size batches and applies
//! the parse error policy. [`reader_thread`] pushes those batches onto the
//! queue until the input ends, the run is cancelled, or a fatal error occurs.

use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::error::{PipelineError, SourceError};
use crate::source::{RecordSource, SourceStats};

use super::queue::{BatchQueue, PushError};
use super::types::{Batch, ParseErrorPolicy};

// Preallocation cap so a huge --batch-size doesn't reserve memory up front
const MAX_PREALLOCATED_RECORDS: usize = 16 * 1024;

/// Groups records from a source into batches of `batch_size`
#[derive(Debug)]
pub struct Batcher {
    source: RecordSource,
    batch_size: usize,
    policy: ParseErrorPolicy,
    next_id: u64,
    done: bool,
}

impl Batcher {
    pub fn new(source: RecordSource, batch_size: usize, policy: ParseErrorPolicy) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            policy,
            next_id: 0,
            done: false,
        }
    }

    pub fn source(&self) -> &RecordSource {
        &self.source
    }
}

impl Iterator for Batcher {
    type Item = Result<Batch, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut records = Vec::with_capacity(self.batch_size.min(MAX_PREALLOCATED_RECORDS));
        let mut start_line = 0;

        while records.len() < self.batch_size {
            match self.source.next() {
                Some(Ok(record)) => {
                    if records.is_empty() {
                        start_line = self.source.line_number();
                    }
                    records.push(record);
                }
                Some(Err(SourceError::Parse(e))) => match self.policy {
                    ParseErrorPolicy::Skip => {
                        tracing::warn!(line = e.line, error = %e.message, "skipping unparsable line");
                    }
                    ParseErrorPolicy::Abort => {
                        self.done = true;
                        return Some(Err(PipelineError::Parse(e)));
                    }
                },
                Some(Err(SourceError::Io(e))) => {
                    self.done = true;
                    return Some(Err(PipelineError::Io(e)));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if records.is_empty() {
            return None;
        }

        let batch = Batch {
            id: self.next_id,
            start_line,
            records,
        };
        self.next_id += 1;
        Some(Ok(batch))
    }
}

/// What the reader thread did before it stopped
#[derive(Debug, Clone, Default)]
pub struct ProducerReport {
    pub source: SourceStats,
    pub batches_pushed: u64,
    pub records_pushed: u64,
    /// Stopped early because the run was cancelled
    pub cancelled: bool,
    /// Stopped early because every worker had exited
    pub abandoned: bool,
}

/// Reader thread: batches records and pushes them until input ends
pub(crate) fn reader_thread(
    mut batcher: Batcher,
    queue: Arc<BatchQueue>,
    cancel: CancelToken,
) -> Result<ProducerReport, PipelineError> {
    tracing::info!(batch_size = batcher.batch_size, "reader started");
    let mut report = ProducerReport::default();

    for item in batcher.by_ref() {
        let batch = item?;
        let records = batch.len() as u64;
        let batch_id = batch.id;

        match queue.push(batch, &cancel) {
            Ok(()) => {
                report.batches_pushed += 1;
                report.records_pushed += records;
                tracing::trace!(batch_id, records, "pushed batch");
            }
            Err(PushError::Cancelled) | Err(PushError::Closed) => {
                report.cancelled = true;
                break;
            }
            Err(PushError::Abandoned) => {
                tracing::error!(batch_id, "all workers have exited, stopping reader");
                report.abandoned = true;
                break;
            }
        }
    }

    report.cancelled |= batcher.source().was_cancelled();
    report.source = batcher.source().stats().clone();

    if report.cancelled {
        tracing::info!(
            batches = report.batches_pushed,
            lines = report.source.lines_read,
            "reader cancelled"
        );
    } else {
        tracing::info!(
            batches = report.batches_pushed,
            records = report.records_pushed,
            lines = report.source.lines_read,
            "reader finished"
        );
    }

    Ok(report)
}
