//! Bounded FIFO between concurrent callers and the session worker.
//!
//! Producers call [`InputQueue::enqueue`] from any task; exactly one consumer
//! (the session worker) calls [`InputQueue::dequeue`]. A single mutex guards
//! the buffer and the sequence counter, so the order in which enqueues take
//! the lock is the order of execution.

use super::operation::{OperationKind, OperationOutcome, QueuedOperation};
use crate::error::{GbError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{Notify, oneshot};

struct QueueState {
    items: VecDeque<QueuedOperation>,
    next_seq: u64,
    /// Set once the queue stops accepting work; returned to later producers.
    closed: Option<GbError>,
}

/// Slots reserved up front; the queue grows on demand up to `capacity`.
const PREALLOCATED_SLOTS: usize = 64;

pub struct InputQueue {
    state: Mutex<QueueState>,
    available: Notify,
    capacity: usize,
}

impl InputQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(PREALLOCATED_SLOTS)),
                next_seq: 1,
                closed: None,
            }),
            available: Notify::new(),
            capacity: capacity.max(1),
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends an operation and returns a ticket for its outcome.
    ///
    /// Fails with `QueueFull` at capacity, or with the close reason once the
    /// queue has been closed.
    pub fn enqueue(self: &Arc<Self>, kind: OperationKind) -> Result<Ticket> {
        let (tx, rx) = oneshot::channel();
        let seq = {
            let mut state = self.lock();
            if let Some(reason) = &state.closed {
                return Err(reason.clone());
            }
            if state.items.len() >= self.capacity {
                return Err(GbError::QueueFull {
                    capacity: self.capacity,
                });
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.items.push_back(QueuedOperation {
                seq,
                kind,
                reply: Some(tx),
            });
            seq
        };
        self.available.notify_one();
        Ok(Ticket {
            seq,
            rx,
            queue: Arc::downgrade(self),
        })
    }

    /// Waits for the next operation. Returns `None` once the queue is closed
    /// and every remaining item has been handed out.
    pub async fn dequeue(&self) -> Option<QueuedOperation> {
        loop {
            {
                let mut state = self.lock();
                if let Some(op) = state.items.pop_front() {
                    return Some(op);
                }
                if state.closed.is_some() {
                    return None;
                }
            }
            // notify_one stores a permit, so a wake-up between the check
            // above and this await is not lost.
            self.available.notified().await;
        }
    }

    /// Non-blocking variant of [`dequeue`](Self::dequeue).
    pub fn try_dequeue(&self) -> Option<QueuedOperation> {
        self.lock().items.pop_front()
    }

    /// Stops accepting new operations. Already queued operations are still
    /// handed to the consumer.
    pub fn close(&self, reason: GbError) {
        {
            let mut state = self.lock();
            if state.closed.is_none() {
                state.closed = Some(reason);
            }
        }
        self.available.notify_one();
    }

    /// Closes the queue and resolves every pending waiter with `reason`.
    /// Returns how many operations were rejected.
    pub fn drain_and_reject(&self, reason: GbError) -> usize {
        let drained: Vec<QueuedOperation> = {
            let mut state = self.lock();
            if state.closed.is_none() {
                state.closed = Some(reason.clone());
            }
            state.items.drain(..).collect()
        };
        self.available.notify_one();
        let count = drained.len();
        for mut op in drained {
            op.resolve(Err(reason.clone()));
        }
        count
    }

    /// Removes a still-queued operation. Returns `false` if it was already
    /// dequeued (and therefore can no longer be canceled).
    pub fn cancel(&self, seq: u64) -> bool {
        let mut state = self.lock();
        match state.items.iter().position(|op| op.seq == seq) {
            Some(index) => {
                state.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    /// Sequence numbers of queued operations, front first.
    pub fn pending_sequences(&self) -> Vec<u64> {
        self.lock().items.iter().map(|op| op.seq).collect()
    }
}

/// Completion handle for an enqueued operation.
///
/// Dropping the ticket does not cancel the operation; it still runs and its
/// effect is visible through the frame cache.
#[derive(Debug)]
pub struct Ticket {
    seq: u64,
    rx: oneshot::Receiver<Result<OperationOutcome>>,
    queue: Weak<InputQueue>,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Waits until the operation has executed (or was rejected).
    pub async fn wait(self) -> Result<OperationOutcome> {
        self.rx.await.unwrap_or_else(|_| {
            Err(GbError::internal(
                "session worker exited without resolving the operation",
            ))
        })
    }

    /// Removes the operation if it has not started executing.
    pub fn cancel(self) -> bool {
        self.queue
            .upgrade()
            .is_some_and(|queue| queue.cancel(self.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::Button;
    use std::time::Duration;

    fn tick() -> OperationKind {
        OperationKind::Tick { frames: 1 }
    }

    #[tokio::test]
    async fn test_fifo_across_kinds_with_increasing_sequence() {
        let queue = InputQueue::new(8);
        let a = queue
            .enqueue(OperationKind::Hold { button: Button::A })
            .unwrap();
        let b = queue.enqueue(tick()).unwrap();
        let c = queue.enqueue(OperationKind::Reset).unwrap();
        assert!(a.seq() < b.seq() && b.seq() < c.seq());

        assert_eq!(queue.dequeue().await.unwrap().kind.name(), "hold");
        assert_eq!(queue.dequeue().await.unwrap().kind.name(), "tick");
        assert_eq!(queue.dequeue().await.unwrap().kind.name(), "reset");
    }

    #[tokio::test]
    async fn test_capacity_four_rejects_fifth_until_dequeue() {
        let queue = InputQueue::new(4);
        for _ in 0..4 {
            queue.enqueue(tick()).unwrap();
        }
        let err = queue.enqueue(tick()).unwrap_err();
        assert_eq!(err, GbError::QueueFull { capacity: 4 });

        queue.dequeue().await.unwrap();
        let fifth = queue.enqueue(tick()).unwrap();
        assert_eq!(fifth.seq(), 5);
    }

    #[tokio::test]
    async fn test_huge_capacity_allocates_lazily() {
        let queue = InputQueue::new(usize::MAX / 2);
        assert_eq!(queue.capacity(), usize::MAX / 2);
        let ticket = queue.enqueue(tick()).unwrap();
        assert_eq!(queue.dequeue().await.unwrap().seq, ticket.seq());
    }

    #[tokio::test]
    async fn test_drain_and_reject_resolves_every_waiter() {
        let queue = InputQueue::new(4);
        let t1 = queue.enqueue(tick()).unwrap();
        let t2 = queue.enqueue(tick()).unwrap();

        let reason = GbError::stopped("s1", "teardown");
        assert_eq!(queue.drain_and_reject(reason.clone()), 2);

        assert_eq!(t1.wait().await.unwrap_err(), reason);
        assert_eq!(t2.wait().await.unwrap_err(), reason);
        assert_eq!(queue.enqueue(tick()).unwrap_err(), reason);
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_close_still_hands_out_remaining_items() {
        let queue = InputQueue::new(4);
        queue.enqueue(tick()).unwrap();
        queue.close(GbError::stopped("s1", "stop requested"));

        assert!(queue.enqueue(tick()).is_err());
        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_removes_only_queued_item() {
        let queue = InputQueue::new(4);
        let t1 = queue.enqueue(tick()).unwrap();
        let t2 = queue.enqueue(tick()).unwrap();
        let t3 = queue.enqueue(tick()).unwrap();
        let seq3 = t3.seq();

        let first = queue.dequeue().await.unwrap();
        assert_eq!(first.seq, t1.seq());
        assert!(!t1.cancel(), "dequeued operations cannot be canceled");

        assert!(t2.cancel());
        assert_eq!(queue.pending_sequences(), vec![seq3]);
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_producer() {
        let queue = InputQueue::new(4);
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await.map(|op| op.seq) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(tick()).unwrap();
        assert_eq!(consumer.await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_concurrent_producers_get_unique_sequences() {
        let queue = InputQueue::new(1024);
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            tasks.push(tokio::spawn(async move {
                let mut seqs = Vec::new();
                for _ in 0..50 {
                    seqs.push(queue.enqueue(tick()).unwrap().seq());
                    tokio::task::yield_now().await;
                }
                seqs
            }));
        }
        let mut all = Vec::new();
        for task in futures::future::join_all(tasks).await {
            let seqs = task.unwrap();
            assert!(seqs.windows(2).all(|w| w[0] < w[1]));
            all.extend(seqs);
        }
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(queue.pending_sequences(), (1..=400).collect::<Vec<_>>());
    }
}
