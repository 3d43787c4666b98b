//! Error types for the dispatch engine.

use crate::types::{ChannelKind, SubscriptionId};
use thiserror::Error;

/// Main error type for dispatch operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Event type must not be empty")]
    MissingEventType,

    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),

    #[error("Webhook channel enabled but no webhook settings configured")]
    MissingWebhookConfig,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("No recipients configured for channel: {0}")]
    MissingRecipients(ChannelKind),

    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),

    #[error("No sender registered for channel: {0}")]
    SenderNotRegistered(ChannelKind),

    #[error("Delivery record not found: {0}")]
    DeliveryNotFound(String),

    #[error("Delivery storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Dispatcher is shut down")]
    ShutDown,
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        DispatchError::Serialization(e.to_string())
    }
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
