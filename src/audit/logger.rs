//! Delivery state machine on top of the store, with alert signals.

use super::records::{AttemptTimings, DeliveryKey, DeliveryRecord, DeliveryStatus};
use super::store::{AttemptUpdate, DeliveryStore};
use crate::channels::DeliveryOutcome;
use crate::types::{ChannelKind, Event, RetryPolicy, SubscriptionId, Timestamp};
use std::sync::Arc;
use tracing::{error, warn};

/// A delivery that dies after this many attempts raises a warning signal.
const EXHAUSTED_WARN_ATTEMPTS: u32 = 3;

/// A webhook call slower than this raises a warning signal.
pub const SLOW_WEBHOOK_WARN_MS: u64 = 10_000;

/// Drives delivery records through `pending -> sent | retrying -> ... ->
/// sent | failed` and appends webhook call records.
///
/// Store failures are logged and swallowed: a broken audit store must never
/// take down the dispatch path or block sibling deliveries.
pub struct DeliveryLogger {
    store: Arc<dyn DeliveryStore>,
}

impl DeliveryLogger {
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DeliveryStore> {
        &self.store
    }

    /// Write the pending record for a delivery task before its first attempt.
    pub fn open_pending(&self, event: &Event, subscription_id: SubscriptionId, channel: ChannelKind) {
        let record = DeliveryRecord::pending(event, subscription_id, channel);
        let key = record.key();
        if let Err(e) = self.store.create_pending(record) {
            error!(key = %key, error = %e, "failed to write pending delivery record");
        }
    }

    /// Record one attempt's outcome and transition the record.
    ///
    /// Returns the updated record, or `None` if the store failed (the caller
    /// then treats the delivery as finished to avoid unbounded retries with
    /// no audit trail).
    pub fn record_attempt(
        &self,
        key: &DeliveryKey,
        policy: &RetryPolicy,
        outcome: &DeliveryOutcome,
        timings: AttemptTimings,
    ) -> Option<DeliveryRecord> {
        let attempts_before = match self.store.get(key) {
            Some(record) => record.attempts,
            None => {
                error!(key = %key, "delivery record missing at attempt time");
                return None;
            }
        };
        let attempts_now = attempts_before + 1;

        let (status, next_attempt_at) = if outcome.success {
            (DeliveryStatus::Sent, None)
        } else if policy.has_retries_left(attempts_now) {
            let delay = policy.delay_after(attempts_now);
            (DeliveryStatus::Retrying, Some(Timestamp::now().plus(delay)))
        } else {
            (DeliveryStatus::Failed, None)
        };

        let update = AttemptUpdate {
            status,
            error: outcome.error.clone(),
            response: outcome.response.clone(),
            next_attempt_at,
            processing_time_ms: timings.processing_time_ms,
            queue_time_ms: timings.queue_time_ms,
        };

        let record = match self.store.apply_attempt(key, update) {
            Ok(record) => record,
            Err(e) => {
                error!(key = %key, error = %e, "failed to record delivery attempt");
                return None;
            }
        };

        if let Some(call) = &outcome.webhook_call {
            let mut call = call.clone();
            call.attempt = record.attempts;
            if call.response_time_ms > SLOW_WEBHOOK_WARN_MS {
                warn!(key = %key, url = %call.url, response_time_ms = call.response_time_ms,
                    "webhook response abnormally slow");
            }
            if let Err(e) = self.store.append_webhook_call(call) {
                error!(key = %key, error = %e, "failed to append webhook call record");
            }
        }

        if record.status == DeliveryStatus::Failed && record.attempts >= EXHAUSTED_WARN_ATTEMPTS {
            warn!(key = %key, attempts = record.attempts, error = ?record.error,
                "delivery exhausted all retry attempts");
        }

        Some(record)
    }

    /// Finalize a record whose scheduled retry was cancelled (e.g. the
    /// subscription was deactivated). No attempt is counted.
    pub fn finalize_cancelled(&self, key: &DeliveryKey, reason: &str) {
        match self.store.finalize(key, reason.to_string()) {
            Ok(record) => {
                warn!(key = %key, attempts = record.attempts, reason,
                    "delivery finalized without retry");
            }
            Err(e) => {
                error!(key = %key, error = %e, "failed to finalize delivery record");
            }
        }
    }
}
