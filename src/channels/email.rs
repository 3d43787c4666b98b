//! Email channel sender.

use super::render::{default_body, default_subject, interpolate};
use super::{fan_out, ChannelMessage, ChannelSender, DeliveryOutcome, ProviderClient};
use crate::types::{ChannelKind, Event, Subscription};
use std::sync::Arc;

/// Renders subject/body from the subscription's templates (or defaults) and
/// fans out to every address in `recipients.emails`.
pub struct EmailSender {
    client: Arc<dyn ProviderClient>,
}

impl EmailSender {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self { client }
    }
}

impl ChannelSender for EmailSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn send(&self, subscription: &Subscription, event: &Event) -> DeliveryOutcome {
        let (subject, body) = match &subscription.email_template {
            Some(template) => (
                interpolate(&template.subject, event),
                interpolate(&template.body, event),
            ),
            None => (default_subject(event), default_body(event)),
        };

        let message = ChannelMessage {
            subject: Some(subject),
            body,
        };
        fan_out(
            self.client.as_ref(),
            &subscription.recipients.emails,
            &message,
            ChannelKind::Email,
        )
    }
}
