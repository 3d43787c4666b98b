//! Priority work queue feeding the delivery workers.

use crate::audit::DeliveryKey;
use crate::types::{ChannelKind, Event, Subscription};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Instant;

/// One delivery attempt waiting to run.
///
/// The subscription is a snapshot taken at match time; workers re-check
/// activity against the live registry before a retry attempt.
pub(crate) struct DeliveryTask {
    pub event: Arc<Event>,
    pub subscription: Arc<Subscription>,
    pub channel: ChannelKind,
    /// Attempt number this task will perform (1-indexed).
    pub attempt: u32,
    /// When the task entered the queue; reset on re-enqueue after a retry
    /// delay so queue time stays per-attempt.
    pub enqueued_at: Instant,
}

impl DeliveryTask {
    pub fn key(&self) -> DeliveryKey {
        DeliveryKey {
            event_id: self.event.id,
            subscription_id: self.subscription.id,
            channel: self.channel,
        }
    }

    /// The follow-up task for the next attempt of the same delivery.
    pub fn next_attempt(self) -> DeliveryTask {
        DeliveryTask {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

struct QueuedTask {
    seq: u64,
    task: DeliveryTask,
}

impl QueuedTask {
    fn rank(&self) -> (crate::types::Priority, std::cmp::Reverse<u64>) {
        // Higher priority first; FIFO within a priority level.
        (self.task.subscription.priority, std::cmp::Reverse(self.seq))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

struct QueueState {
    heap: BinaryHeap<QueuedTask>,
    next_seq: u64,
    closed: bool,
}

/// Unbounded priority queue with blocking pop.
pub(crate) struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a task. Returns false once the queue is closed.
    pub fn push(&self, task: DeliveryTask) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(QueuedTask { seq, task });
        self.available.notify_one();
        true
    }

    /// Block until a task is available. Returns `None` once closed; tasks
    /// still queued at close time are dropped (in-memory engine, no
    /// cross-restart durability).
    pub fn pop(&self) -> Option<DeliveryTask> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(queued) = state.heap.pop() {
                return Some(queued.task);
            }
            self.available.wait(&mut state);
        }
    }

    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.available.notify_all();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }
}
