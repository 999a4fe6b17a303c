//! Thread-safe aggregation for parallel processing
//!
//! Workers fold each batch into a [`PartialAggregate`] on their own thread and
//! hand it to the shared [`Aggregator`]. Every field is a plain sum, so merges
//! commute and the merge order does not matter. Integer counters use atomic
//! adds; the floating-point length sum is kept under a mutex so it is the
//! exact sum of the contributions.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::record::{AuthStatus, Record};

use super::types::Batch;

/// Statistics for a single batch, computed by one worker
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialAggregate {
    pub record_count: u64,
    pub logged_in: u64,
    pub logged_out: u64,
    pub length_sum: f64,
    pub length_count: u64,
    /// Fields present with the wrong JSON type; the field is treated as absent
    pub invalid_fields: u64,
}

impl PartialAggregate {
    pub fn from_batch(batch: &Batch) -> Self {
        let mut partial = Self::default();
        for record in &batch.records {
            partial.add_record(record);
        }
        partial
    }

    pub fn add_record(&mut self, record: &Record) {
        self.record_count += 1;

        match record.auth_status() {
            Ok(AuthStatus::LoggedIn) => self.logged_in += 1,
            Ok(AuthStatus::LoggedOut) => self.logged_out += 1,
            Ok(AuthStatus::Unknown) => {}
            Err(e) => {
                tracing::trace!(error = %e, "ignoring auth field");
                self.invalid_fields += 1;
            }
        }

        match record.length() {
            Ok(Some(length)) => {
                self.length_sum += length;
                self.length_count += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::trace!(error = %e, "ignoring length field");
                self.invalid_fields += 1;
            }
        }
    }
}

/// Point-in-time copy of the global aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub record_count: u64,
    pub logged_in: u64,
    pub logged_out: u64,
    pub length_count: u64,
    pub length_sum: f64,
    pub invalid_fields: u64,
    pub batches_merged: u64,
}

impl AggregateSnapshot {
    /// Mean length over records that carry one; 0 when none do
    pub fn average_length(&self) -> f64 {
        if self.length_count > 0 {
            self.length_sum / self.length_count as f64
        } else {
            0.0
        }
    }
}

/// Shared accumulator merging partial aggregates from all workers
#[derive(Debug, Default)]
pub struct Aggregator {
    record_count: AtomicU64,
    logged_in: AtomicU64,
    logged_out: AtomicU64,
    length_count: AtomicU64,
    invalid_fields: AtomicU64,
    batches_merged: AtomicU64,
    length_sum: Mutex<f64>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the length sum with poison recovery
    fn lock_length_sum(&self) -> MutexGuard<'_, f64> {
        match self.length_sum.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("worker thread panicked while merging, recovering length sum");
                poisoned.into_inner()
            }
        }
    }

    /// Add one batch's statistics. Safe to call from any number of threads.
    pub fn merge(&self, partial: &PartialAggregate) {
        self.record_count
            .fetch_add(partial.record_count, Ordering::Relaxed);
        self.logged_in.fetch_add(partial.logged_in, Ordering::Relaxed);
        self.logged_out
            .fetch_add(partial.logged_out, Ordering::Relaxed);
        self.length_count
            .fetch_add(partial.length_count, Ordering::Relaxed);
        self.invalid_fields
            .fetch_add(partial.invalid_fields, Ordering::Relaxed);

        {
            let mut sum = self.lock_length_sum();
            *sum += partial.length_sum;
        }

        self.batches_merged.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the totals. Only consistent once every worker has been joined.
    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            record_count: self.record_count.load(Ordering::Relaxed),
            logged_in: self.logged_in.load(Ordering::Relaxed),
            logged_out: self.logged_out.load(Ordering::Relaxed),
            length_count: self.length_count.load(Ordering::Relaxed),
            length_sum: *self.lock_length_sum(),
            invalid_fields: self.invalid_fields.load(Ordering::Relaxed),
            batches_merged: self.batches_merged.load(Ordering::Relaxed),
        }
    }
}
