//! Delivery record storage.

use super::records::{DeliveryKey, DeliveryRecord, DeliveryStatus, WebhookCallRecord};
use crate::error::{DispatchError, Result};
use crate::types::{EventId, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Fields applied to a delivery record by one attempt.
#[derive(Clone, Debug)]
pub struct AttemptUpdate {
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub response: Option<String>,
    pub next_attempt_at: Option<Timestamp>,
    pub processing_time_ms: u64,
    pub queue_time_ms: u64,
}

/// Storage for delivery and webhook-call records.
///
/// Implementations own the mutual-exclusion discipline: updates for one key
/// must be atomic, but different keys may be written concurrently.
pub trait DeliveryStore: Send + Sync {
    /// Insert a pending record if none exists for its key. Idempotent.
    fn create_pending(&self, record: DeliveryRecord) -> Result<()>;

    /// Atomically apply one attempt's outcome: increments `attempts`, sets
    /// `last_attempt_at`, and writes the update fields. Returns the updated
    /// record.
    fn apply_attempt(&self, key: &DeliveryKey, update: AttemptUpdate) -> Result<DeliveryRecord>;

    /// Atomically finalize a record without an attempt having run (used when
    /// a scheduled retry is cancelled). Returns the updated record.
    fn finalize(&self, key: &DeliveryKey, error: String) -> Result<DeliveryRecord>;

    fn get(&self, key: &DeliveryKey) -> Option<DeliveryRecord>;

    /// All delivery records for one event.
    fn for_event(&self, event_id: EventId) -> Vec<DeliveryRecord>;

    /// Append one raw webhook call record.
    fn append_webhook_call(&self, call: WebhookCallRecord) -> Result<()>;

    /// Webhook calls for one delivery, in append order.
    fn webhook_calls(&self, key: &DeliveryKey) -> Vec<WebhookCallRecord>;
}

/// In-memory store: per-key atomicity comes from holding the map's write
/// lock across each read-modify-write.
pub struct InMemoryDeliveryStore {
    records: RwLock<HashMap<DeliveryKey, DeliveryRecord>>,
    webhook_calls: RwLock<Vec<WebhookCallRecord>>,
}

impl InMemoryDeliveryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            webhook_calls: RwLock::new(Vec::new()),
        }
    }

    /// Total number of delivery records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for InMemoryDeliveryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryStore for InMemoryDeliveryStore {
    fn create_pending(&self, record: DeliveryRecord) -> Result<()> {
        self.records.write().entry(record.key()).or_insert(record);
        Ok(())
    }

    fn apply_attempt(&self, key: &DeliveryKey, update: AttemptUpdate) -> Result<DeliveryRecord> {
        let mut records = self.records.write();
        let record = records
            .get_mut(key)
            .ok_or_else(|| DispatchError::DeliveryNotFound(key.to_string()))?;

        record.attempts += 1;
        record.last_attempt_at = Some(Timestamp::now());
        record.status = update.status;
        record.error = update.error;
        record.response = update.response;
        record.next_attempt_at = update.next_attempt_at;
        record.processing_time_ms = Some(update.processing_time_ms);
        record.queue_time_ms = Some(update.queue_time_ms);

        Ok(record.clone())
    }

    fn finalize(&self, key: &DeliveryKey, error: String) -> Result<DeliveryRecord> {
        let mut records = self.records.write();
        let record = records
            .get_mut(key)
            .ok_or_else(|| DispatchError::DeliveryNotFound(key.to_string()))?;

        record.status = DeliveryStatus::Failed;
        record.error = Some(error);
        record.next_attempt_at = None;

        Ok(record.clone())
    }

    fn get(&self, key: &DeliveryKey) -> Option<DeliveryRecord> {
        self.records.read().get(key).cloned()
    }

    fn for_event(&self, event_id: EventId) -> Vec<DeliveryRecord> {
        let mut records: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.subscription_id, r.channel.as_str()));
        records
    }

    fn append_webhook_call(&self, call: WebhookCallRecord) -> Result<()> {
        self.webhook_calls.write().push(call);
        Ok(())
    }

    fn webhook_calls(&self, key: &DeliveryKey) -> Vec<WebhookCallRecord> {
        self.webhook_calls
            .read()
            .iter()
            .filter(|call| call.delivery_key() == *key)
            .cloned()
            .collect()
    }
}
