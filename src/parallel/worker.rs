//! Worker threads for parallel processing
//!
//! Each worker pops batches, folds them into a partial aggregate, and merges
//! the result into the shared aggregator. A panic while folding is caught at
//! the worker boundary: it is reported as a [`WorkerFault`], the batch is
//! lost, and only that worker stops.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;

use crate::cancel::CancelToken;
use crate::error::{PipelineError, WorkerFault};

use super::queue::BatchQueue;
use super::tracker::{Aggregator, PartialAggregate};
use super::types::Batch;

/// Per-worker summary returned by [`WorkerPool::join`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub batches: u64,
    pub records: u64,
    pub fault: Option<WorkerFault>,
}

type Folder = dyn Fn(&Batch) -> PartialAggregate + Send + Sync;

const WORKER_THREAD_PREFIX: &str = "ndstat-worker-";

thread_local! {
    static PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Keep worker panics off stderr; they are reported as faults instead
///
/// The hook remembers where a worker panicked so the fault warning can name
/// it. Panics on any other thread go to the previously installed hook.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if is_worker_thread(thread::current().name()) {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}", l.file(), l.line()));
                PANIC_LOCATION.with(|slot| *slot.borrow_mut() = location);
            } else {
                previous(info);
            }
        }));
    });
}

fn is_worker_thread(name: Option<&str>) -> bool {
    name.is_some_and(|n| n.starts_with(WORKER_THREAD_PREFIX))
}

fn take_panic_location() -> Option<String> {
    PANIC_LOCATION.with(|slot| slot.borrow_mut().take())
}

pub struct WorkerPool {
    handles: Vec<(usize, thread::JoinHandle<WorkerReport>)>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .finish()
    }
}

impl WorkerPool {
    /// Start `count` workers folding with [`PartialAggregate::from_batch`]
    pub fn spawn(
        count: usize,
        queue: Arc<BatchQueue>,
        aggregator: Arc<Aggregator>,
        cancel: CancelToken,
    ) -> Result<Self, PipelineError> {
        Self::spawn_with(count, queue, aggregator, cancel, PartialAggregate::from_batch)
    }

    /// Start `count` workers with a custom fold function
    pub fn spawn_with<F>(
        count: usize,
        queue: Arc<BatchQueue>,
        aggregator: Arc<Aggregator>,
        cancel: CancelToken,
        folder: F,
    ) -> Result<Self, PipelineError>
    where
        F: Fn(&Batch) -> PartialAggregate + Send + Sync + 'static,
    {
        install_panic_hook();
        let folder: Arc<Folder> = Arc::new(folder);
        let alive = Arc::new(AtomicUsize::new(count));
        let mut handles = Vec::with_capacity(count);

        for worker_id in 1..=count {
            let ctx = WorkerContext {
                worker_id,
                queue: queue.clone(),
                aggregator: aggregator.clone(),
                cancel: cancel.clone(),
                folder: folder.clone(),
                alive: alive.clone(),
            };

            let spawned = thread::Builder::new()
                .name(format!("{}{}", WORKER_THREAD_PREFIX, worker_id))
                .spawn(move || worker_thread(ctx));

            match spawned {
                Ok(handle) => handles.push((worker_id, handle)),
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "failed to start worker");
                    // Release the workers that did start before bailing out
                    queue.complete();
                    WorkerPool { handles }.join();
                    return Err(PipelineError::Thread("worker"));
                }
            }
        }

        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit
    pub fn join(self) -> Vec<WorkerReport> {
        self.handles
            .into_iter()
            .map(|(worker_id, handle)| {
                handle.join().unwrap_or_else(|payload| WorkerReport {
                    worker_id,
                    fault: Some(WorkerFault {
                        worker_id,
                        batch_id: 0,
                        message: panic_message(payload.as_ref()),
                    }),
                    ..Default::default()
                })
            })
            .collect()
    }
}

struct WorkerContext {
    worker_id: usize,
    queue: Arc<BatchQueue>,
    aggregator: Arc<Aggregator>,
    cancel: CancelToken,
    folder: Arc<Folder>,
    alive: Arc<AtomicUsize>,
}

/// Worker thread: folds batches until the queue ends or the run is cancelled
fn worker_thread(ctx: WorkerContext) -> WorkerReport {
    let worker_id = ctx.worker_id;
    let mut report = WorkerReport {
        worker_id,
        ..Default::default()
    };
    tracing::debug!(worker_id, "worker waiting for batches");

    while let Some(batch) = ctx.queue.pop(&ctx.cancel) {
        match panic::catch_unwind(AssertUnwindSafe(|| (ctx.folder)(&batch))) {
            Ok(partial) => {
                ctx.aggregator.merge(&partial);
                report.batches += 1;
                report.records += partial.record_count;
                tracing::debug!(
                    worker_id,
                    batch_id = batch.id,
                    records = partial.record_count,
                    "merged batch"
                );
            }
            Err(payload) => {
                let fault = WorkerFault {
                    worker_id,
                    batch_id: batch.id,
                    message: panic_message(payload.as_ref()),
                };
                let location = take_panic_location();
                tracing::warn!(
                    worker_id,
                    batch_id = batch.id,
                    lost_records = batch.len(),
                    error = %fault.message,
                    location = location.as_deref().unwrap_or("unknown"),
                    "worker fault, batch dropped and worker stopped"
                );
                report.fault = Some(fault);
                break;
            }
        }
    }

    if ctx.alive.fetch_sub(1, Ordering::AcqRel) == 1 {
        // Last one out: a producer blocked on a full queue would wait forever
        ctx.queue.abandon();
    }

    tracing::debug!(
        worker_id,
        batches = report.batches,
        records = report.records,
        "worker finished"
    );
    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use serde_json::json;

    fn batch(id: u64, n: usize) -> Batch {
        let records = (0..n)
            .map(|_| match json!({"auth": "Logged In", "length": 2.0}) {
                serde_json::Value::Object(map) => Record::from_fields(map),
                _ => unreachable!(),
            })
            .collect();
        Batch {
            id,
            start_line: 1,
            records,
        }
    }

    #[test]
    fn test_pool_processes_all_batches() {
        let queue = Arc::new(BatchQueue::new(4));
        let aggregator = Arc::new(Aggregator::new());
        let cancel = CancelToken::new();
        let pool = WorkerPool::spawn(3, queue.clone(), aggregator.clone(), cancel.clone()).unwrap();
        assert_eq!(pool.len(), 3);

        for id in 0..10 {
            queue.push(batch(id, 5), &cancel).unwrap();
        }
        queue.complete();

        let reports = pool.join();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.fault.is_none()));
        assert_eq!(reports.iter().map(|r| r.batches).sum::<u64>(), 10);
        assert_eq!(reports.iter().map(|r| r.records).sum::<u64>(), 50);

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.record_count, 50);
        assert_eq!(snapshot.logged_in, 50);
        assert_eq!(snapshot.length_sum, 100.0);
        assert_eq!(snapshot.batches_merged, 10);
    }

    #[test]
    fn test_workers_exit_on_empty_completed_queue() {
        let queue = Arc::new(BatchQueue::new(2));
        let aggregator = Arc::new(Aggregator::new());
        let pool = WorkerPool::spawn(4, queue.clone(), aggregator.clone(), CancelToken::new())
            .unwrap();
        queue.complete();
        let reports = pool.join();
        assert!(reports.iter().all(|r| r.batches == 0 && r.fault.is_none()));
        assert_eq!(aggregator.snapshot().record_count, 0);
    }

    #[test]
    fn test_workers_exit_on_cancel() {
        let queue = Arc::new(BatchQueue::new(2));
        let aggregator = Arc::new(Aggregator::new());
        let cancel = CancelToken::new();
        let pool = WorkerPool::spawn(2, queue, aggregator, cancel.clone()).unwrap();
        cancel.cancel();
        assert_eq!(pool.join().len(), 2);
    }

    #[test]
    fn test_fault_stops_only_the_faulting_worker() {
        let queue = Arc::new(BatchQueue::new(8));
        let aggregator = Arc::new(Aggregator::new());
        let cancel = CancelToken::new();
        let pool = WorkerPool::spawn_with(
            2,
            queue.clone(),
            aggregator.clone(),
            cancel.clone(),
            |batch: &Batch| {
                if batch.id == 3 {
                    panic!("corrupt batch");
                }
                PartialAggregate::from_batch(batch)
            },
        )
        .unwrap();

        for id in 0..8 {
            queue.push(batch(id, 1), &cancel).unwrap();
        }
        queue.complete();

        let reports = pool.join();
        let faults: Vec<&WorkerFault> = reports.iter().filter_map(|r| r.fault.as_ref()).collect();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].batch_id, 3);
        assert_eq!(faults[0].message, "corrupt batch");

        // Batch 3 is lost, every other batch is merged exactly once
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.record_count, 7);
        assert_eq!(snapshot.batches_merged, 7);
    }

    #[test]
    fn test_last_worker_fault_abandons_queue() {
        let queue = Arc::new(BatchQueue::new(1));
        let aggregator = Arc::new(Aggregator::new());
        let cancel = CancelToken::new();
        let pool = WorkerPool::spawn_with(
            1,
            queue.clone(),
            aggregator,
            cancel.clone(),
            |_: &Batch| -> PartialAggregate { panic!("always fails") },
        )
        .unwrap();

        queue.push(batch(0, 1), &cancel).unwrap();
        let reports = pool.join();
        assert!(reports[0].fault.is_some());
        assert!(queue.is_abandoned());
    }

    #[test]
    fn test_worker_thread_names() {
        assert!(is_worker_thread(Some("ndstat-worker-3")));
        assert!(!is_worker_thread(Some("ndstat-reader")));
        assert!(!is_worker_thread(Some("main")));
        assert!(!is_worker_thread(None));
    }

    #[test]
    fn test_worker_panic_location_is_captured() {
        install_panic_hook();
        let handle = thread::Builder::new()
            .name(format!("{}test", WORKER_THREAD_PREFIX))
            .spawn(|| {
                let result = panic::catch_unwind(|| panic!("fold failed"));
                assert!(result.is_err());
                take_panic_location()
            })
            .unwrap();

        let location = handle.join().unwrap().expect("location recorded");
        assert!(location.contains("worker.rs"), "{}", location);
        assert!(take_panic_location().is_none());
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        let other: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(other.as_ref()), "worker panicked");
    }
}
