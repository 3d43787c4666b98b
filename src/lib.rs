//! # Courier
//!
//! An event notification dispatch engine: domain events published by
//! producers are matched against user-configured subscriptions and
//! delivered across seven channels (email, Telegram, Slack, webhook, SMS,
//! push, WhatsApp), with per-subscription retry/backoff and a full
//! delivery audit trail.
//!
//! ## Core Concepts
//!
//! - **Events**: Immutable facts with a type string and structured payload
//! - **Subscriptions**: Validated configs mapping event types + filters to
//!   channels and a retry policy
//! - **Delivery records**: Per-`(event, subscription, channel)` audit/state
//!   rows, plus raw per-call records for webhooks
//! - **At-least-once**: In-process delivery with retries; idempotency is
//!   left to receivers (webhook signatures let them dedupe)
//!
//! ## Example
//!
//! ```ignore
//! use courier::{
//!     Dispatcher, DispatcherConfig, EventMetadata, InMemoryDeliveryStore,
//!     SenderRegistry, SubscriptionConfig, SubscriptionRegistry,
//! };
//!
//! let registry = Arc::new(SubscriptionRegistry::new());
//! registry.register(SubscriptionConfig {
//!     name: "ops webhooks".into(),
//!     event_types: vec!["order.created".into()],
//!     channels: vec![ChannelKind::Webhook],
//!     webhook: Some(WebhookConfig::new("https://ops.example.com/hook")),
//!     ..Default::default()
//! })?;
//!
//! let dispatcher = Dispatcher::new(
//!     DispatcherConfig::default(),
//!     registry,
//!     senders, // ChannelSender implementations wired to real clients
//!     Arc::new(InMemoryDeliveryStore::new()),
//! );
//!
//! dispatcher.publish("order.created", json!({"data": {"total": 42}}), metadata)?;
//! ```

pub mod audit;
pub mod bus;
pub mod channels;
pub mod error;
pub mod filters;
pub mod matching;
mod retry;
pub mod types;

// Re-exports
pub use audit::{
    AttemptTimings, DeliveryKey, DeliveryLogger, DeliveryRecord, DeliveryStatus, DeliveryStore,
    InMemoryDeliveryStore, TimingBreakdown, WebhookCallRecord, WebhookCallStatus,
};
pub use bus::{Dispatcher, DispatcherConfig, DispatcherStats, EventPublisher};
pub use channels::{
    sign_body, ChannelMessage, ChannelSender, DeliveryOutcome, EmailSender, HttpTransport,
    ProviderClient, ProviderReceipt, PushSender, SenderRegistry, SlackSender, SmsSender,
    TelegramSender, TransportError, WebhookRequest, WebhookResponse, WebhookSender,
    WhatsAppSender, SIGNATURE_HEADER, USER_AGENT,
};
pub use error::{DispatchError, Result};
pub use filters::{Filter, FilterOperator};
pub use matching::SubscriptionRegistry;
pub use types::*;
