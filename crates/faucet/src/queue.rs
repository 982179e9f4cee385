//! FIFO queue serializing transfers from the operator account.
//!
//! Only the request at the head of the queue may submit, so at most one
//! transaction from the operator account is ever in flight and nonces are
//! consumed strictly in admission order.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Clone)]
struct Ticket {
    seq: u64,
    label: String,
}

#[derive(Debug, Default)]
struct QueueState {
    next_seq: u64,
    pending: VecDeque<Ticket>,
}

#[derive(Debug)]
pub struct SubmissionQueue {
    state: Mutex<QueueState>,
    advanced: Notify,
    poll_interval: Duration,
}

impl SubmissionQueue {
    /// `poll_interval` bounds how long a waiter sleeps between head checks
    /// when no release notification arrives.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            advanced: Notify::new(),
            poll_interval,
        }
    }

    /// Append a request to the tail. The returned slot leaves the queue when
    /// dropped.
    pub fn admit(&self, label: String) -> QueueSlot<'_> {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push_back(Ticket { seq, label });
        debug!(seq, depth = state.pending.len(), "Request admitted to queue");
        QueueSlot { queue: self, seq }
    }

    pub fn depth(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Labels of queued requests, head first.
    pub fn snapshot(&self) -> Vec<String> {
        self.state
            .lock()
            .pending
            .iter()
            .map(|ticket| ticket.label.clone())
            .collect()
    }

    fn is_head(&self, seq: u64) -> bool {
        self.state
            .lock()
            .pending
            .front()
            .map_or(false, |ticket| ticket.seq == seq)
    }

    fn release(&self, seq: u64) {
        {
            let mut state = self.state.lock();
            if let Some(position) = state.pending.iter().position(|ticket| ticket.seq == seq) {
                state.pending.remove(position);
            }
            debug!(seq, depth = state.pending.len(), "Request left queue");
        }
        self.advanced.notify_waiters();
    }
}

/// A request's position in the [`SubmissionQueue`].
#[derive(Debug)]
pub struct QueueSlot<'a> {
    queue: &'a SubmissionQueue,
    seq: u64,
}

impl QueueSlot<'_> {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Resolve once this slot is at the head of the queue.
    pub async fn wait_turn(&self) {
        loop {
            let notified = self.queue.advanced.notified();
            tokio::pin!(notified);
            // Register before checking so a release between the check and
            // the await is not missed.
            notified.as_mut().enable();

            if self.queue.is_head(self.seq) {
                return;
            }

            let _ = tokio::time::timeout(self.queue.poll_interval, notified).await;
        }
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.queue.release(self.seq);
    }
}
