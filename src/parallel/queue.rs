//! Bounded hand-off between the reader and the workers
//!
//! A thin layer over a `crossbeam_channel::bounded` channel. The channel
//! provides the capacity bound and single delivery; this type adds an
//! idempotent `complete()`, cancellation at both blocking points, and an
//! `abandon()` signal for when no consumer is left.

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use std::sync::Mutex;
use thiserror::Error;

use crate::cancel::CancelToken;

use super::types::Batch;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    #[error("cancelled while waiting for queue space")]
    Cancelled,
    #[error("queue already completed")]
    Closed,
    #[error("no workers left to consume batches")]
    Abandoned,
}

#[derive(Debug)]
pub struct BatchQueue {
    sender: Mutex<Option<Sender<Batch>>>,
    receiver: Receiver<Batch>,
    capacity: usize,
    abandoned: CancelToken,
}

impl BatchQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            capacity,
            abandoned: CancelToken::new(),
        }
    }

    fn current_sender(&self) -> Option<Sender<Batch>> {
        match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Hand a batch to the workers, blocking while the queue is full
    pub fn push(&self, batch: Batch, cancel: &CancelToken) -> Result<(), PushError> {
        let sender = self.current_sender().ok_or(PushError::Closed)?;
        if cancel.is_cancelled() {
            return Err(PushError::Cancelled);
        }
        if self.abandoned.is_cancelled() {
            return Err(PushError::Abandoned);
        }

        select! {
            send(sender, batch) -> res => res.map_err(|_| PushError::Closed),
            recv(cancel.watch()) -> _ => Err(PushError::Cancelled),
            recv(self.abandoned.watch()) -> _ => Err(PushError::Abandoned),
        }
    }

    /// Take the next batch, blocking while the queue is empty and not completed
    ///
    /// Returns `None` once the queue is completed and drained, or when
    /// `cancel` trips.
    pub fn pop(&self, cancel: &CancelToken) -> Option<Batch> {
        if cancel.is_cancelled() {
            return None;
        }

        select! {
            recv(self.receiver) -> msg => msg.ok(),
            recv(cancel.watch()) -> _ => None,
        }
    }

    /// Signal that no more batches will be pushed. Idempotent.
    pub fn complete(&self) {
        let mut sender = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sender.take();
    }

    pub fn is_completed(&self) -> bool {
        self.current_sender().is_none()
    }

    /// Wake a blocked producer: nobody is left to pop
    pub fn abandon(&self) {
        self.abandoned.cancel();
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.is_cancelled()
    }

    /// Discard everything still queued, returning how many batches were dropped
    pub fn drain(&self) -> usize {
        let mut dropped = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(_) => dropped += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        dropped
    }

    /// Batches pushed but not yet popped
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
