//! Telegram channel sender.

use super::render::default_body;
use super::{fan_out, ChannelMessage, ChannelSender, DeliveryOutcome, ProviderClient};
use crate::types::{ChannelKind, Event, Subscription};
use std::sync::Arc;

/// Sends one message per configured chat id. The provider receipt carries
/// the Telegram message id on success.
pub struct TelegramSender {
    client: Arc<dyn ProviderClient>,
}

impl TelegramSender {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self { client }
    }
}

impl ChannelSender for TelegramSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn send(&self, subscription: &Subscription, event: &Event) -> DeliveryOutcome {
        let message = ChannelMessage {
            subject: None,
            body: default_body(event),
        };
        fan_out(
            self.client.as_ref(),
            &subscription.recipients.telegram_chat_ids,
            &message,
            ChannelKind::Telegram,
        )
    }
}
