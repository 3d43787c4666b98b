//! SMS channel sender.

use super::render::default_body;
use super::{fan_out, ChannelMessage, ChannelSender, DeliveryOutcome, ProviderClient};
use crate::types::{ChannelKind, Event, Subscription};
use std::sync::Arc;

/// Carrier-friendly length cap; longer bodies are truncated with an
/// ellipsis rather than split into segments.
const MAX_SMS_CHARS: usize = 320;

pub struct SmsSender {
    client: Arc<dyn ProviderClient>,
}

impl SmsSender {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self { client }
    }
}

impl ChannelSender for SmsSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn send(&self, subscription: &Subscription, event: &Event) -> DeliveryOutcome {
        let mut body = default_body(event);
        if body.chars().count() > MAX_SMS_CHARS {
            body = body.chars().take(MAX_SMS_CHARS - 1).collect();
            body.push('…');
        }

        let message = ChannelMessage {
            subject: None,
            body,
        };
        fan_out(
            self.client.as_ref(),
            &subscription.recipients.sms_numbers,
            &message,
            ChannelKind::Sms,
        )
    }
}
