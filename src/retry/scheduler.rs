//! Time-ordered retry queue.

use crate::bus::task::{DeliveryTask, TaskQueue};
use parking_lot::{Condvar, Mutex};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

struct ScheduledRetry {
    due: Instant,
    seq: u64,
    task: DeliveryTask,
}

impl PartialEq for ScheduledRetry {
    fn eq(&self, other: &Self) -> bool {
        (self.due, self.seq) == (other.due, other.seq)
    }
}

impl Eq for ScheduledRetry {}

impl PartialOrd for ScheduledRetry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledRetry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

struct SchedulerState {
    // Min-heap on due time: the next retry to fire sits on top.
    heap: BinaryHeap<Reverse<ScheduledRetry>>,
    next_seq: u64,
    shutdown: bool,
}

/// Holds retrying deliveries until their backoff delay elapses, then hands
/// them back to the worker queue.
///
/// Cancellation is not handled here: the worker re-checks subscription
/// activity when the retry fires, so a deactivated subscription's retry is
/// dropped and its record finalized at that point.
pub(crate) struct RetryScheduler {
    state: Arc<Mutex<SchedulerState>>,
    changed: Arc<Condvar>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RetryScheduler {
    /// Start the scheduler thread feeding `queue`.
    pub fn new(queue: Arc<TaskQueue>) -> Self {
        let state = Arc::new(Mutex::new(SchedulerState {
            heap: BinaryHeap::new(),
            next_seq: 0,
            shutdown: false,
        }));
        let changed = Arc::new(Condvar::new());

        let handle = {
            let state = state.clone();
            let changed = changed.clone();
            std::thread::spawn(move || run(state, changed, queue))
        };

        Self {
            state,
            changed,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Enqueue a task to re-fire after `delay`.
    pub fn schedule(&self, task: DeliveryTask, delay: Duration) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        debug!(key = %task.key(), attempt = task.attempt, delay_ms = delay.as_millis() as u64,
            "retry scheduled");
        state.heap.push(Reverse(ScheduledRetry {
            due: Instant::now() + delay,
            seq,
            task,
        }));
        self.changed.notify_one();
    }

    /// Stop the scheduler thread. Pending retries are dropped.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            state.shutdown = true;
            self.changed.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.state.lock().heap.len()
    }
}

fn run(state: Arc<Mutex<SchedulerState>>, changed: Arc<Condvar>, queue: Arc<TaskQueue>) {
    let mut guard = state.lock();
    loop {
        if guard.shutdown {
            return;
        }

        let now = Instant::now();
        match guard.heap.peek().map(|Reverse(entry)| entry.due) {
            Some(due) if due <= now => {
                if let Some(Reverse(entry)) = guard.heap.pop() {
                    let mut task = entry.task;
                    // Re-enqueue outside the lock so a blocked worker queue
                    // cannot stall schedule() callers.
                    drop(guard);
                    task.enqueued_at = Instant::now();
                    queue.push(task);
                    guard = state.lock();
                }
            }
            Some(due) => {
                let _ = changed.wait_until(&mut guard, due);
            }
            None => {
                changed.wait(&mut guard);
            }
        }
    }
}
