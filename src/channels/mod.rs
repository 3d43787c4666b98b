//! Channel senders.
//!
//! One [`ChannelSender`] per delivery medium, all behind the same contract:
//! `send` never panics and never returns an error past its boundary; every
//! failure comes back as a [`DeliveryOutcome`] with `success = false`.
//!
//! The concrete provider clients (SMTP, Telegram Bot API, Slack API, SMS and
//! WhatsApp gateways, push services) live outside this crate. The six
//! messaging senders fan out over an injected [`ProviderClient`]; the
//! webhook sender drives an injected [`HttpTransport`].

mod email;
mod push;
mod render;
mod slack;
mod sms;
mod telegram;
mod webhook;
mod whatsapp;

pub use email::EmailSender;
pub use push::PushSender;
pub use render::{default_body, default_subject, interpolate};
pub use slack::SlackSender;
pub use sms::SmsSender;
pub use telegram::TelegramSender;
pub use webhook::{
    sign_body, HttpTransport, TransportError, WebhookRequest, WebhookResponse, WebhookSender,
    SIGNATURE_HEADER, USER_AGENT,
};
pub use whatsapp::WhatsAppSender;

use crate::audit::WebhookCallRecord;
use crate::types::{ChannelKind, Event, Subscription};
use std::collections::HashMap;
use std::sync::Arc;

/// Normalized result of one send attempt.
#[derive(Clone, Debug)]
pub struct DeliveryOutcome {
    pub success: bool,
    /// Provider response summary (message ids, status line).
    pub response: Option<String>,
    pub error: Option<String>,
    pub status_code: Option<u16>,
    /// Raw call record, webhook channel only. One per physical HTTP call.
    pub webhook_call: Option<WebhookCallRecord>,
}

impl DeliveryOutcome {
    pub fn delivered(response: Option<String>) -> Self {
        Self {
            success: true,
            response,
            error: None,
            status_code: None,
            webhook_call: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
            status_code: None,
            webhook_call: None,
        }
    }
}

/// A rendered notification for one of the messaging channels.
#[derive(Clone, Debug)]
pub struct ChannelMessage {
    /// Subject/title; channels without a subject line ignore it.
    pub subject: Option<String>,
    pub body: String,
}

/// Receipt returned by a provider client for one address.
#[derive(Clone, Debug, Default)]
pub struct ProviderReceipt {
    /// Provider-assigned message id, when the provider reports one.
    pub message_id: Option<String>,
}

/// Pluggable transmission client for one messaging channel.
///
/// Implementations perform the actual network call for a single address and
/// report failures as strings; they are expected to enforce their own
/// timeouts.
pub trait ProviderClient: Send + Sync {
    fn deliver(
        &self,
        address: &str,
        message: &ChannelMessage,
    ) -> std::result::Result<ProviderReceipt, String>;
}

/// Maps each channel kind to its sender.
pub struct SenderRegistry {
    senders: HashMap<ChannelKind, Arc<dyn ChannelSender>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self {
            senders: HashMap::new(),
        }
    }

    pub fn register(&mut self, sender: Arc<dyn ChannelSender>) {
        self.senders.insert(sender.kind(), sender);
    }

    pub fn get(&self, kind: ChannelKind) -> Option<Arc<dyn ChannelSender>> {
        self.senders.get(&kind).cloned()
    }
}

impl Default for SenderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One delivery medium's sender.
pub trait ChannelSender: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Perform one transmission attempt. Must not panic; all failures are
    /// reported through the outcome.
    fn send(&self, subscription: &Subscription, event: &Event) -> DeliveryOutcome;
}

/// Shared fan-out for the address-list channels: deliver to every address,
/// aggregate receipts, and fold any per-address failure into one outcome.
pub(crate) fn fan_out(
    client: &dyn ProviderClient,
    addresses: &[String],
    message: &ChannelMessage,
    channel: ChannelKind,
) -> DeliveryOutcome {
    if addresses.is_empty() {
        return DeliveryOutcome::failed(format!("no recipients configured for {channel}"));
    }

    let mut receipts = Vec::new();
    let mut failures = Vec::new();

    for address in addresses {
        match client.deliver(address, message) {
            Ok(receipt) => {
                if let Some(id) = receipt.message_id {
                    receipts.push(format!("{address}: {id}"));
                } else {
                    receipts.push(address.clone());
                }
            }
            Err(e) => failures.push(format!("{address}: {e}")),
        }
    }

    if failures.is_empty() {
        DeliveryOutcome::delivered(Some(receipts.join(", ")))
    } else {
        DeliveryOutcome {
            success: false,
            response: (!receipts.is_empty()).then(|| receipts.join(", ")),
            error: Some(failures.join("; ")),
            status_code: None,
            webhook_call: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// Records every delivery; fails addresses listed in `fail`.
    pub struct RecordingClient {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail: Vec<String>,
    }

    impl RecordingClient {
        pub fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: Vec::new(),
            }
        }

        pub fn failing_on(address: &str) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: vec![address.to_string()],
            }
        }
    }

    impl ProviderClient for RecordingClient {
        fn deliver(
            &self,
            address: &str,
            message: &ChannelMessage,
        ) -> std::result::Result<ProviderReceipt, String> {
            if self.fail.iter().any(|a| a == address) {
                return Err("provider rejected".into());
            }
            self.sent
                .lock()
                .push((address.to_string(), message.body.clone()));
            Ok(ProviderReceipt {
                message_id: Some(format!("msg-{}", self.sent.lock().len())),
            })
        }
    }
}
