//! Core types for the dispatch engine.

use crate::error::{DispatchError, Result};
use crate::filters::Filter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a published event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        EventId(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a subscription (assigned by the registry).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_millis() as i64)
    }

    /// This timestamp shifted forward by a duration.
    pub fn plus(self, delay: Duration) -> Self {
        Timestamp(self.0 + delay.as_millis() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Scheduling priority of a subscription's deliveries.
///
/// Higher priorities are dequeued first when the worker pool is saturated;
/// this is a scheduling hint, not a real-time guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// One delivery medium.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Telegram,
    Slack,
    Webhook,
    Sms,
    Push,
    #[serde(rename = "whatsapp")]
    WhatsApp,
}

impl ChannelKind {
    /// All seven supported channels.
    pub const ALL: [ChannelKind; 7] = [
        ChannelKind::Email,
        ChannelKind::Telegram,
        ChannelKind::Slack,
        ChannelKind::Webhook,
        ChannelKind::Sms,
        ChannelKind::Push,
        ChannelKind::WhatsApp,
    ];

    /// Stable lowercase name (used in logs and wire formats).
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Slack => "slack",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Sms => "sms",
            ChannelKind::Push => "push",
            ChannelKind::WhatsApp => "whatsapp",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an event came from.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Producing subsystem (e.g. "orders", "courses").
    pub source: String,
    /// Collection the domain fact belongs to.
    pub collection: String,
    /// Mutation that produced the fact (e.g. "create", "update").
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_email: Option<String>,
}

/// An immutable domain fact published by a producer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub event_type: String,
    /// Arbitrary structured payload; filters address into it via dot-paths.
    pub payload: serde_json::Value,
    pub occurred_at: Timestamp,
    pub metadata: EventMetadata,
}

impl Event {
    /// Create a new event, assigning id and occurrence time.
    pub fn new(
        event_type: impl Into<String>,
        payload: serde_json::Value,
        metadata: EventMetadata,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            payload,
            occurred_at: Timestamp::now(),
            metadata,
        }
    }
}

/// Per-subscription retry/backoff policy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts before a delivery is finalized as failed (1-10).
    pub max_attempts: u32,
    /// Delay before the first retry (>= 100).
    pub initial_delay_ms: u64,
    /// Exponential growth factor (>= 1.0).
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay (>= 1000).
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Check the configured bounds.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 || self.max_attempts > 10 {
            return Err(DispatchError::InvalidRetryPolicy(format!(
                "maxAttempts must be 1-10, got {}",
                self.max_attempts
            )));
        }
        if self.initial_delay_ms < 100 {
            return Err(DispatchError::InvalidRetryPolicy(format!(
                "initialDelayMs must be >= 100, got {}",
                self.initial_delay_ms
            )));
        }
        if self.backoff_multiplier < 1.0 || !self.backoff_multiplier.is_finite() {
            return Err(DispatchError::InvalidRetryPolicy(format!(
                "backoffMultiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay_ms < 1000 {
            return Err(DispatchError::InvalidRetryPolicy(format!(
                "maxDelayMs must be >= 1000, got {}",
                self.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Delay to wait after `attempts` failed attempts, before the next one.
    ///
    /// `min(initial * multiplier^(attempts - 1), max)`: after the first
    /// failure the delay is exactly `initial_delay_ms`.
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(63) as i32;
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exp);
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether a delivery with `attempts` recorded failures has retries left.
    pub fn has_retries_left(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Per-channel address lists for a subscription.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipients {
    pub emails: Vec<String>,
    pub telegram_chat_ids: Vec<String>,
    pub slack_channels: Vec<String>,
    pub sms_numbers: Vec<String>,
    pub push_tokens: Vec<String>,
    pub whatsapp_numbers: Vec<String>,
}

impl Recipients {
    /// Address list for one channel. The webhook channel has no address
    /// list; its target lives in [`WebhookConfig`].
    pub fn for_channel(&self, kind: ChannelKind) -> &[String] {
        match kind {
            ChannelKind::Email => &self.emails,
            ChannelKind::Telegram => &self.telegram_chat_ids,
            ChannelKind::Slack => &self.slack_channels,
            ChannelKind::Sms => &self.sms_numbers,
            ChannelKind::Push => &self.push_tokens,
            ChannelKind::WhatsApp => &self.whatsapp_numbers,
            ChannelKind::Webhook => &[],
        }
    }
}

/// Default per-call timeout for outbound webhooks.
pub const DEFAULT_WEBHOOK_TIMEOUT_MS: u64 = 10_000;

fn default_webhook_timeout_ms() -> u64 {
    DEFAULT_WEBHOOK_TIMEOUT_MS
}

/// Outbound webhook settings for a subscription.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Absolute URL to POST to.
    pub url: String,
    /// HMAC-SHA256 signing secret for the `X-Signature` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: None,
            headers: HashMap::new(),
            timeout_ms: DEFAULT_WEBHOOK_TIMEOUT_MS,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

/// Subject/body templates for the email channel.
///
/// `{{dotted.path}}` placeholders are resolved against the event payload;
/// `{{event.type}}` and `{{event.id}}` are built in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
}

/// Input for creating or updating a subscription (before an id is assigned).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionConfig {
    pub name: String,
    /// Event types this subscription listens for.
    pub event_types: Vec<String>,
    /// Channels to fan deliveries out over.
    pub channels: Vec<ChannelKind>,
    pub priority: Priority,
    pub is_active: bool,
    pub recipients: Recipients,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_template: Option<EmailTemplate>,
    /// AND-combined payload filters; empty list always matches.
    pub filters: Vec<Filter>,
    pub retry_policy: RetryPolicy,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            event_types: Vec::new(),
            channels: Vec::new(),
            priority: Priority::default(),
            is_active: true,
            recipients: Recipients::default(),
            webhook: None,
            email_template: None,
            filters: Vec::new(),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl SubscriptionConfig {
    /// Validate the configuration. Called by the registry on every write;
    /// a config that fails here never enters the dispatch pipeline.
    pub fn validate(&self) -> Result<()> {
        self.retry_policy.validate()?;

        for &channel in &self.channels {
            match channel {
                ChannelKind::Webhook => {
                    let webhook = self
                        .webhook
                        .as_ref()
                        .ok_or(DispatchError::MissingWebhookConfig)?;
                    if url::Url::parse(&webhook.url).is_err() {
                        return Err(DispatchError::InvalidWebhookUrl(webhook.url.clone()));
                    }
                }
                ChannelKind::Email => {
                    if self.recipients.emails.is_empty() {
                        return Err(DispatchError::MissingRecipients(channel));
                    }
                    for email in &self.recipients.emails {
                        if !email.contains('@') {
                            return Err(DispatchError::InvalidEmail(email.clone()));
                        }
                    }
                }
                ChannelKind::Sms | ChannelKind::WhatsApp => {
                    let numbers = self.recipients.for_channel(channel);
                    if numbers.is_empty() {
                        return Err(DispatchError::MissingRecipients(channel));
                    }
                    for number in numbers {
                        if !is_valid_phone(number) {
                            return Err(DispatchError::InvalidPhoneNumber(number.clone()));
                        }
                    }
                }
                ChannelKind::Telegram | ChannelKind::Slack | ChannelKind::Push => {
                    if self.recipients.for_channel(channel).is_empty() {
                        return Err(DispatchError::MissingRecipients(channel));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A registered subscription (id assigned by the registry).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: SubscriptionId,
    pub name: String,
    pub event_types: Vec<String>,
    pub channels: Vec<ChannelKind>,
    pub priority: Priority,
    pub is_active: bool,
    pub recipients: Recipients,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_template: Option<EmailTemplate>,
    pub filters: Vec<Filter>,
    pub retry_policy: RetryPolicy,
}

impl Subscription {
    /// Build a subscription from a validated config.
    pub fn from_config(id: SubscriptionId, config: SubscriptionConfig) -> Self {
        Self {
            id,
            name: config.name,
            event_types: config.event_types,
            channels: config.channels,
            priority: config.priority,
            is_active: config.is_active,
            recipients: config.recipients,
            webhook: config.webhook,
            email_template: config.email_template,
            filters: config.filters,
            retry_policy: config.retry_policy,
        }
    }
}

/// Phone number check: optional leading `+`, then digits, spaces,
/// dashes, and parentheses, with at least one digit.
pub fn is_valid_phone(number: &str) -> bool {
    let rest = number.strip_prefix('+').unwrap_or(number);
    !rest.is_empty()
        && rest.chars().any(|c| c.is_ascii_digit())
        && rest
            .chars()
            .all(|c| c.is_ascii_digit() || c == ' ' || c == '-' || c == '(' || c == ')')
}
