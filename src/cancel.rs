//! Cooperative cancellation shared by every pipeline stage
//!
//! A [`CancelToken`] is a flag plus a channel that is never written to. When
//! the token trips, the only sender is dropped, so every clone of the watch
//! receiver becomes disconnected at once. Blocking stages put that receiver
//! in a `select!` next to their real work, which makes cancellation a
//! broadcast without a message per listener.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    trip: Mutex<Option<Sender<()>>>,
    watch: Receiver<()>,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (trip, watch) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trip: Mutex::new(Some(trip)),
                watch,
            }),
        }
    }

    /// Trip the token. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let mut trip = match self.inner.trip.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trip.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that disconnects when the token trips; nothing is ever sent on it
    pub fn watch(&self) -> &Receiver<()> {
        &self.inner.watch
    }

    /// Block until the token trips or `timeout` elapses; true if cancelled
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        // Disconnect is the only way this returns before the timeout
        let _ = self.inner.watch.recv_timeout(timeout);
        self.is_cancelled()
    }

    /// Trip the token once `timeout` has elapsed unless it trips earlier
    pub fn cancel_after(&self, timeout: Duration) -> std::io::Result<thread::JoinHandle<()>> {
        let token = self.clone();
        thread::Builder::new()
            .name("ndstat-deadline".to_string())
            .spawn(move || {
                if !token.wait_timeout(timeout) {
                    tracing::info!(?timeout, "run timeout reached, cancelling");
                    token.cancel();
                }
            })
    }
}
