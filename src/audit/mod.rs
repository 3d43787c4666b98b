//! Delivery audit logging.
//!
//! One [`DeliveryRecord`] tracks a `(event, subscription, channel)` delivery
//! across attempts; the webhook channel additionally gets one append-only
//! [`WebhookCallRecord`] per physical HTTP call. Storage sits behind the
//! [`DeliveryStore`] trait and owns per-key atomicity; the
//! [`DeliveryLogger`] drives the status state machine on top of it.

mod logger;
mod records;
mod store;

pub use logger::{DeliveryLogger, SLOW_WEBHOOK_WARN_MS};
pub use records::{
    AttemptTimings, DeliveryKey, DeliveryRecord, DeliveryStatus, TimingBreakdown,
    WebhookCallRecord, WebhookCallStatus,
};
pub use store::{AttemptUpdate, DeliveryStore, InMemoryDeliveryStore};
