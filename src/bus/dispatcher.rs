//! The dispatcher: publish entry point and delivery worker pool.

use super::task::{DeliveryTask, TaskQueue};
use crate::audit::{AttemptTimings, DeliveryLogger, DeliveryStatus, DeliveryStore};
use crate::channels::{DeliveryOutcome, SenderRegistry};
use crate::error::{DispatchError, Result};
use crate::matching::SubscriptionRegistry;
use crate::retry::RetryScheduler;
use crate::types::{Event, EventId, EventMetadata};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::debug;

/// The narrow capability producers hold. Handed out at construction time;
/// nothing in the engine is looked up through ambient state.
pub trait EventPublisher: Send + Sync {
    /// Publish a domain event. Returns as soon as delivery tasks are
    /// enqueued; never surfaces delivery failures.
    fn publish(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        metadata: EventMetadata,
    ) -> Result<EventId>;
}

/// Dispatcher configuration.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Size of the delivery worker pool.
    pub workers: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Point-in-time counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub published: u64,
    pub matched_subscriptions: u64,
    pub tasks_enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    matched_subscriptions: AtomicU64,
    tasks_enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

struct WorkerContext {
    registry: Arc<SubscriptionRegistry>,
    senders: Arc<SenderRegistry>,
    logger: Arc<DeliveryLogger>,
    scheduler: Arc<RetryScheduler>,
    counters: Arc<Counters>,
}

/// Event bus entry point.
///
/// Owns the worker pool and the retry scheduler; coordinates the matcher,
/// the channel senders, and the delivery logger. Deliveries for different
/// `(subscription, channel)` pairs run concurrently; attempts within one
/// delivery are strictly sequential because the next attempt is only
/// scheduled after the previous outcome is recorded.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    logger: Arc<DeliveryLogger>,
    queue: Arc<TaskQueue>,
    scheduler: Arc<RetryScheduler>,
    counters: Arc<Counters>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl Dispatcher {
    /// Start the dispatcher: spawns the worker pool and scheduler thread.
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<SubscriptionRegistry>,
        senders: SenderRegistry,
        store: Arc<dyn DeliveryStore>,
    ) -> Self {
        let logger = Arc::new(DeliveryLogger::new(store));
        let queue = Arc::new(TaskQueue::new());
        let scheduler = Arc::new(RetryScheduler::new(queue.clone()));
        let counters = Arc::new(Counters::default());

        let context = Arc::new(WorkerContext {
            registry: registry.clone(),
            senders: Arc::new(senders),
            logger: logger.clone(),
            scheduler: scheduler.clone(),
            counters: counters.clone(),
        });

        let workers = (0..config.workers.max(1))
            .map(|_| {
                let context = context.clone();
                let queue = queue.clone();
                std::thread::spawn(move || worker_loop(context, queue))
            })
            .collect();

        Self {
            registry,
            logger,
            queue,
            scheduler,
            counters,
            workers: Mutex::new(workers),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Publish an event: assign id and occurrence time, match
    /// subscriptions, write pending records, and enqueue one delivery task
    /// per `(subscription, channel)` pair.
    ///
    /// Fails only on local validation (empty event type) or after shutdown;
    /// delivery failures never surface here.
    pub fn publish(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        metadata: EventMetadata,
    ) -> Result<EventId> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(DispatchError::ShutDown);
        }
        if event_type.trim().is_empty() {
            return Err(DispatchError::MissingEventType);
        }

        let event = Event::new(event_type, payload, metadata);
        let event_id = event.id;
        self.counters.published.fetch_add(1, Ordering::Relaxed);

        let matched = self.registry.match_event(&event);
        debug!(event_id = %event_id, event_type, matches = matched.len(), "event published");

        let event = Arc::new(event);
        for subscription in matched {
            self.counters
                .matched_subscriptions
                .fetch_add(1, Ordering::Relaxed);
            for &channel in &subscription.channels {
                self.logger.open_pending(&event, subscription.id, channel);
                let accepted = self.queue.push(DeliveryTask {
                    event: event.clone(),
                    subscription: subscription.clone(),
                    channel,
                    attempt: 1,
                    enqueued_at: Instant::now(),
                });
                if accepted {
                    self.counters.tasks_enqueued.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        Ok(event_id)
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn delivery_store(&self) -> &Arc<dyn DeliveryStore> {
        self.logger.store()
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            published: self.counters.published.load(Ordering::Relaxed),
            matched_subscriptions: self.counters.matched_subscriptions.load(Ordering::Relaxed),
            tasks_enqueued: self.counters.tasks_enqueued.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop intake, wake all workers, and join them. Tasks still queued and
    /// retries not yet due are dropped (at-least-once only within one
    /// process lifetime). Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scheduler.shutdown();
        self.queue.close();
        for handle in self.workers.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl EventPublisher for Dispatcher {
    fn publish(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        metadata: EventMetadata,
    ) -> Result<EventId> {
        Dispatcher::publish(self, event_type, payload, metadata)
    }
}

fn worker_loop(context: Arc<WorkerContext>, queue: Arc<TaskQueue>) {
    while let Some(task) = queue.pop() {
        process_task(&context, task);
    }
}

fn process_task(context: &WorkerContext, task: DeliveryTask) {
    let key = task.key();
    let queue_time_ms = task.enqueued_at.elapsed().as_millis() as u64;

    // A deactivated subscription cancels future retries, not first
    // attempts already accepted at publish time.
    if task.attempt > 1 && !context.registry.is_active(task.subscription.id) {
        context
            .logger
            .finalize_cancelled(&key, "subscription deactivated");
        context.counters.failed.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let started = Instant::now();
    let outcome = match context.senders.get(task.channel) {
        Some(sender) => sender.send(&task.subscription, &task.event),
        None => DeliveryOutcome::failed(format!("no sender registered for {}", task.channel)),
    };
    let timings = AttemptTimings {
        queue_time_ms,
        processing_time_ms: started.elapsed().as_millis() as u64,
    };

    let policy = task.subscription.retry_policy;
    let record = match context.logger.record_attempt(&key, &policy, &outcome, timings) {
        Some(record) => record,
        // Audit store failure: drop the delivery rather than retry without
        // a trail.
        None => return,
    };

    match record.status {
        DeliveryStatus::Sent => {
            context.counters.delivered.fetch_add(1, Ordering::Relaxed);
        }
        DeliveryStatus::Failed => {
            context.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        DeliveryStatus::Retrying => {
            let delay = policy.delay_after(record.attempts);
            context.scheduler.schedule(task.next_attempt(), delay);
        }
        DeliveryStatus::Pending => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryDeliveryStore;
    use crate::channels::test_support::RecordingClient;
    use crate::channels::TelegramSender;
    use crate::types::{ChannelKind, Recipients, SubscriptionConfig};
    use serde_json::json;

    fn dispatcher_with_telegram() -> (Dispatcher, Arc<InMemoryDeliveryStore>) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let store = Arc::new(InMemoryDeliveryStore::new());
        let mut senders = SenderRegistry::new();
        senders.register(Arc::new(TelegramSender::new(Arc::new(RecordingClient::new()))));
        let dispatcher = Dispatcher::new(
            DispatcherConfig { workers: 2 },
            registry,
            senders,
            store.clone(),
        );
        (dispatcher, store)
    }

    #[test]
    fn test_publish_rejects_empty_event_type() {
        let (dispatcher, _store) = dispatcher_with_telegram();
        assert!(matches!(
            dispatcher.publish("  ", json!({}), EventMetadata::default()),
            Err(DispatchError::MissingEventType)
        ));
    }

    #[test]
    fn test_publish_after_shutdown_fails() {
        let (dispatcher, _store) = dispatcher_with_telegram();
        dispatcher.shutdown();
        assert!(matches!(
            dispatcher.publish("order.created", json!({}), EventMetadata::default()),
            Err(DispatchError::ShutDown)
        ));
    }

    #[test]
    fn test_publish_counts_and_returns_id() {
        let (dispatcher, _store) = dispatcher_with_telegram();
        dispatcher
            .registry()
            .register(SubscriptionConfig {
                name: "t".into(),
                event_types: vec!["order.created".into()],
                channels: vec![ChannelKind::Telegram],
                recipients: Recipients {
                    telegram_chat_ids: vec!["1".into()],
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();

        dispatcher
            .publish("order.created", json!({}), EventMetadata::default())
            .unwrap();

        let stats = dispatcher.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.matched_subscriptions, 1);
        assert_eq!(stats.tasks_enqueued, 1);
        dispatcher.shutdown();
    }
}
