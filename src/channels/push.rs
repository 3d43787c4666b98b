//! Push notification channel sender.

use super::render::{default_body, default_subject};
use super::{fan_out, ChannelMessage, ChannelSender, DeliveryOutcome, ProviderClient};
use crate::types::{ChannelKind, Event, Subscription};
use std::sync::Arc;

/// Sends one notification per device token; the subject doubles as the
/// notification title.
pub struct PushSender {
    client: Arc<dyn ProviderClient>,
}

impl PushSender {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self { client }
    }
}

impl ChannelSender for PushSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    fn send(&self, subscription: &Subscription, event: &Event) -> DeliveryOutcome {
        let message = ChannelMessage {
            subject: Some(default_subject(event)),
            body: default_body(event),
        };
        fan_out(
            self.client.as_ref(),
            &subscription.recipients.push_tokens,
            &message,
            ChannelKind::Push,
        )
    }
}
