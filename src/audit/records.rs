//! Audit record types.

use crate::types::{ChannelKind, Event, EventId, SubscriptionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery lifecycle state.
///
/// `pending -> sent` on a first-attempt success; `pending -> retrying` on a
/// failure with retries left; `retrying -> sent | retrying | failed`;
/// `failed` once `max_attempts` is exhausted. `sent` and `failed` are
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Retrying,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Sent | DeliveryStatus::Failed)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Retrying => "retrying",
        };
        f.write_str(s)
    }
}

/// Identity of one delivery: one event over one channel of one subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryKey {
    pub event_id: EventId,
    pub subscription_id: SubscriptionId,
    pub channel: ChannelKind,
}

impl fmt::Debug for DeliveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeliveryKey({}/{}/{})",
            self.event_id, self.subscription_id, self.channel
        )
    }
}

impl fmt::Display for DeliveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.event_id, self.subscription_id, self.channel
        )
    }
}

/// Audit/state record for one delivery across its attempts.
///
/// Created with `status = pending` before the first attempt and updated in
/// place after each attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub event_id: EventId,
    pub event_type: String,
    pub subscription_id: SubscriptionId,
    pub channel: ChannelKind,
    pub status: DeliveryStatus,
    /// Attempts performed so far.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_time_ms: Option<u64>,
    pub created_at: Timestamp,
}

impl DeliveryRecord {
    /// Fresh pending record for a delivery task that has not been attempted.
    pub fn pending(event: &Event, subscription_id: SubscriptionId, channel: ChannelKind) -> Self {
        Self {
            event_id: event.id,
            event_type: event.event_type.clone(),
            subscription_id,
            channel,
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
            next_attempt_at: None,
            error: None,
            response: None,
            processing_time_ms: None,
            queue_time_ms: None,
            created_at: Timestamp::now(),
        }
    }

    pub fn key(&self) -> DeliveryKey {
        DeliveryKey {
            event_id: self.event_id,
            subscription_id: self.subscription_id,
            channel: self.channel,
        }
    }
}

/// Wall-clock measurements for one attempt, taken by the worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttemptTimings {
    /// Time spent queued before the attempt started.
    pub queue_time_ms: u64,
    /// Time from attempt start to the sender's outcome.
    pub processing_time_ms: u64,
}

/// Outcome class of one raw webhook HTTP call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookCallStatus {
    Success,
    Failed,
    Timeout,
}

/// Phase timings of one webhook HTTP call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub dns_ms: u64,
    pub connect_ms: u64,
    pub tls_ms: u64,
    pub ttfb_ms: u64,
}

/// One raw HTTP call for the webhook channel. Append-only: a delivery with
/// three attempts has three of these.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCallRecord {
    pub url: String,
    pub event_id: EventId,
    pub event_type: String,
    pub subscription_id: SubscriptionId,
    pub status: WebhookCallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Attempt number within the owning delivery (filled by the logger).
    pub attempt: u32,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_headers: Vec<(String, String)>,
    pub request_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Vec<(String, String)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub timing: TimingBreakdown,
    pub recorded_at: Timestamp,
}

impl WebhookCallRecord {
    pub fn delivery_key(&self) -> DeliveryKey {
        DeliveryKey {
            event_id: self.event_id,
            subscription_id: self.subscription_id,
            channel: ChannelKind::Webhook,
        }
    }
}
