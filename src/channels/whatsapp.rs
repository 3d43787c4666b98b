//! WhatsApp channel sender.

use super::render::default_body;
use super::{fan_out, ChannelMessage, ChannelSender, DeliveryOutcome, ProviderClient};
use crate::types::{is_valid_phone, ChannelKind, Event, Subscription};
use std::sync::Arc;

/// Fans out to each WhatsApp number. Numbers are validated when the
/// subscription is saved; the sender re-checks them so a stale or
/// hand-edited document cannot reach the gateway with garbage.
pub struct WhatsAppSender {
    client: Arc<dyn ProviderClient>,
}

impl WhatsAppSender {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self { client }
    }
}

impl ChannelSender for WhatsAppSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::WhatsApp
    }

    fn send(&self, subscription: &Subscription, event: &Event) -> DeliveryOutcome {
        let numbers = &subscription.recipients.whatsapp_numbers;
        if let Some(bad) = numbers.iter().find(|n| !is_valid_phone(n)) {
            return DeliveryOutcome::failed(format!("invalid phone number: {bad}"));
        }

        let message = ChannelMessage {
            subject: None,
            body: default_body(event),
        };
        fan_out(self.client.as_ref(), numbers, &message, ChannelKind::WhatsApp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::test_support::RecordingClient;
    use crate::types::{EventMetadata, Recipients, SubscriptionConfig, SubscriptionId};
    use serde_json::json;

    fn subscription(numbers: Vec<String>) -> Subscription {
        Subscription::from_config(
            SubscriptionId(1),
            SubscriptionConfig {
                channels: vec![ChannelKind::WhatsApp],
                recipients: Recipients {
                    whatsapp_numbers: numbers,
                    ..Default::default()
                },
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_rejects_invalid_number_before_sending() {
        let client = Arc::new(RecordingClient::new());
        let sender = WhatsAppSender::new(client.clone());
        let event = Event::new("order.created", json!({}), EventMetadata::default());

        let outcome = sender.send(&subscription(vec!["not-a-number!".into()]), &event);
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("invalid phone number"));
        assert!(client.sent.lock().is_empty());
    }

    #[test]
    fn test_valid_numbers_delivered() {
        let sender = WhatsAppSender::new(Arc::new(RecordingClient::new()));
        let event = Event::new("order.created", json!({}), EventMetadata::default());
        let outcome = sender.send(&subscription(vec!["+44 20 7946 0958".into()]), &event);
        assert!(outcome.success);
    }
}
