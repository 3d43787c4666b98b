//! Slack channel sender.

use super::render::{default_body, default_subject};
use super::{fan_out, ChannelMessage, ChannelSender, DeliveryOutcome, ProviderClient};
use crate::types::{ChannelKind, Event, Subscription};
use std::sync::Arc;

/// Posts to each configured channel or user identifier.
pub struct SlackSender {
    client: Arc<dyn ProviderClient>,
}

impl SlackSender {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self { client }
    }
}

impl ChannelSender for SlackSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }

    fn send(&self, subscription: &Subscription, event: &Event) -> DeliveryOutcome {
        let message = ChannelMessage {
            subject: Some(default_subject(event)),
            body: default_body(event),
        };
        fan_out(
            self.client.as_ref(),
            &subscription.recipients.slack_channels,
            &message,
            ChannelKind::Slack,
        )
    }
}
