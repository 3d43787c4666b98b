//! End-to-end dispatch tests: publish -> match -> fan-out -> audit records.

use courier::{
    sign_body, ChannelKind, ChannelMessage, DeliveryKey, DeliveryStatus, Dispatcher,
    DispatcherConfig, EmailSender, EventId, EventMetadata, Filter, FilterOperator, HttpTransport,
    InMemoryDeliveryStore, ProviderClient, ProviderReceipt, PushSender, Recipients, RetryPolicy,
    SenderRegistry, SlackSender, SmsSender, SubscriptionConfig, SubscriptionId,
    SubscriptionRegistry, TelegramSender, TimingBreakdown, TransportError, WebhookConfig,
    WebhookRequest, WebhookResponse, WebhookSender, WhatsAppSender, SIGNATURE_HEADER,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Provider client that records deliveries and optionally always fails.
struct MockClient {
    sent: Mutex<Vec<(String, String)>>,
    fail_always: bool,
}

impl MockClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_always: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_always: true,
        })
    }
}

impl ProviderClient for MockClient {
    fn deliver(&self, address: &str, message: &ChannelMessage) -> Result<ProviderReceipt, String> {
        if self.fail_always {
            return Err("gateway unavailable".into());
        }
        self.sent
            .lock()
            .push((address.to_string(), message.body.clone()));
        Ok(ProviderReceipt {
            message_id: Some(format!("mock-{}", self.sent.lock().len())),
        })
    }
}

/// Transport that records requests and answers with a fixed status.
struct MockTransport {
    requests: Mutex<Vec<WebhookRequest>>,
    status: u16,
}

impl MockTransport {
    fn with_status(status: u16) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            status,
        })
    }
}

impl HttpTransport for MockTransport {
    fn execute(&self, request: &WebhookRequest) -> Result<WebhookResponse, TransportError> {
        self.requests.lock().push(request.clone());
        Ok(WebhookResponse {
            status_code: self.status,
            headers: vec![],
            body: "{\"ok\":true}".into(),
            timing: TimingBreakdown::default(),
            response_time_ms: 5,
        })
    }
}

struct Harness {
    dispatcher: Dispatcher,
    store: Arc<InMemoryDeliveryStore>,
    email: Arc<MockClient>,
    transport: Arc<MockTransport>,
}

fn harness(email: Arc<MockClient>, transport: Arc<MockTransport>) -> Harness {
    let registry = Arc::new(SubscriptionRegistry::new());
    let store = Arc::new(InMemoryDeliveryStore::new());

    let mut senders = SenderRegistry::new();
    senders.register(Arc::new(EmailSender::new(email.clone())));
    senders.register(Arc::new(TelegramSender::new(MockClient::new())));
    senders.register(Arc::new(SlackSender::new(MockClient::new())));
    senders.register(Arc::new(SmsSender::new(MockClient::new())));
    senders.register(Arc::new(PushSender::new(MockClient::new())));
    senders.register(Arc::new(WhatsAppSender::new(MockClient::new())));
    senders.register(Arc::new(WebhookSender::new(transport.clone())));

    let dispatcher = Dispatcher::new(
        DispatcherConfig { workers: 4 },
        registry,
        senders,
        store.clone(),
    );

    Harness {
        dispatcher,
        store,
        email,
        transport,
    }
}

fn key(event_id: EventId, subscription_id: SubscriptionId, channel: ChannelKind) -> DeliveryKey {
    DeliveryKey {
        event_id,
        subscription_id,
        channel,
    }
}

fn wait_for_status(store: &InMemoryDeliveryStore, key: &DeliveryKey, status: DeliveryStatus) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(record) = courier::DeliveryStore::get(store, key) {
            if record.status == status {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!(
                "timed out waiting for {key:?} to reach {status}, current: {:?}",
                courier::DeliveryStore::get(store, key)
            );
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn email_webhook_subscription() -> SubscriptionConfig {
    SubscriptionConfig {
        name: "orders".into(),
        event_types: vec!["order.created".into()],
        channels: vec![ChannelKind::Email, ChannelKind::Webhook],
        recipients: Recipients {
            emails: vec!["ops@example.com".into()],
            ..Default::default()
        },
        webhook: Some(WebhookConfig::new("https://ops.example.com/hook")),
        ..Default::default()
    }
}

#[test]
fn test_matched_subscription_delivers_on_both_channels() {
    let h = harness(MockClient::new(), MockTransport::with_status(200));
    let sub_id = h
        .dispatcher
        .registry()
        .register(email_webhook_subscription())
        .unwrap();

    let event_id = h
        .dispatcher
        .publish(
            "order.created",
            json!({"data": {"total": 42}}),
            EventMetadata {
                source: "orders".into(),
                collection: "orders".into(),
                operation: "create".into(),
                ..Default::default()
            },
        )
        .unwrap();

    wait_for_status(&h.store, &key(event_id, sub_id, ChannelKind::Email), DeliveryStatus::Sent);
    wait_for_status(&h.store, &key(event_id, sub_id, ChannelKind::Webhook), DeliveryStatus::Sent);

    // Exactly one record per (subscription, channel) pair.
    let records = courier::DeliveryStore::for_event(h.store.as_ref(), event_id);
    assert_eq!(records.len(), 2);

    assert_eq!(h.email.sent.lock().len(), 1);
    assert_eq!(h.transport.requests.lock().len(), 1);

    let stats = h.dispatcher.stats();
    assert_eq!(stats.published, 1);
    assert_eq!(stats.tasks_enqueued, 2);
    assert_eq!(stats.delivered, 2);
}

#[test]
fn test_non_matching_subscriptions_are_excluded() {
    let h = harness(MockClient::new(), MockTransport::with_status(200));
    let registry = h.dispatcher.registry();

    let matching = registry.register(email_webhook_subscription()).unwrap();

    let mut wrong_type = email_webhook_subscription();
    wrong_type.event_types = vec!["lead.created".into()];
    registry.register(wrong_type).unwrap();

    let inactive = registry.register(email_webhook_subscription()).unwrap();
    registry.set_active(inactive, false).unwrap();

    let mut filtered_out = email_webhook_subscription();
    filtered_out.filters = vec![Filter::new("data.total", FilterOperator::Gt, json!(100))];
    registry.register(filtered_out).unwrap();

    let event_id = h
        .dispatcher
        .publish("order.created", json!({"data": {"total": 42}}), EventMetadata::default())
        .unwrap();

    wait_for_status(&h.store, &key(event_id, matching, ChannelKind::Email), DeliveryStatus::Sent);
    wait_for_status(&h.store, &key(event_id, matching, ChannelKind::Webhook), DeliveryStatus::Sent);

    let records = courier::DeliveryStore::for_event(h.store.as_ref(), event_id);
    assert!(records.iter().all(|r| r.subscription_id == matching));
    assert_eq!(records.len(), 2);
}

#[test]
fn test_webhook_signature_and_wire_format() {
    let h = harness(MockClient::new(), MockTransport::with_status(200));
    let mut config = email_webhook_subscription();
    config.channels = vec![ChannelKind::Webhook];
    config.webhook = Some(WebhookConfig::new("https://ops.example.com/hook").with_secret("s3cr3t"));
    let sub_id = h.dispatcher.registry().register(config).unwrap();

    let event_id = h
        .dispatcher
        .publish("order.created", json!({"data": {"total": 42}}), EventMetadata::default())
        .unwrap();
    let delivery = key(event_id, sub_id, ChannelKind::Webhook);
    wait_for_status(&h.store, &delivery, DeliveryStatus::Sent);

    let requests = h.transport.requests.lock();
    let request = &requests[0];
    let signature = request
        .headers
        .iter()
        .find(|(name, _)| name == SIGNATURE_HEADER)
        .map(|(_, value)| value.clone())
        .expect("signature header present");
    assert_eq!(signature, sign_body("s3cr3t", &request.body));

    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["eventId"], json!(event_id.to_string()));
    assert_eq!(body["eventType"], "order.created");
    assert_eq!(body["data"]["data"]["total"], 42);
    assert!(body["occurredAt"].is_number());

    let calls = courier::DeliveryStore::webhook_calls(h.store.as_ref(), &delivery);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].signature.as_deref(), Some(signature.as_str()));
    assert_eq!(calls[0].attempt, 1);
}

#[test]
fn test_channel_outcomes_are_independent() {
    // Email provider is down; webhook endpoint is fine.
    let h = harness(MockClient::failing(), MockTransport::with_status(200));
    let mut config = email_webhook_subscription();
    config.retry_policy = RetryPolicy {
        max_attempts: 1,
        ..Default::default()
    };
    let sub_id = h.dispatcher.registry().register(config).unwrap();

    let event_id = h
        .dispatcher
        .publish("order.created", json!({}), EventMetadata::default())
        .unwrap();

    wait_for_status(&h.store, &key(event_id, sub_id, ChannelKind::Webhook), DeliveryStatus::Sent);
    wait_for_status(&h.store, &key(event_id, sub_id, ChannelKind::Email), DeliveryStatus::Failed);

    let email = courier::DeliveryStore::get(h.store.as_ref(), &key(event_id, sub_id, ChannelKind::Email)).unwrap();
    assert!(email.error.unwrap().contains("gateway unavailable"));
}

#[test]
fn test_publish_validates_event_type() {
    let h = harness(MockClient::new(), MockTransport::with_status(200));
    assert!(h
        .dispatcher
        .publish("", json!({}), EventMetadata::default())
        .is_err());
}

#[test]
fn test_invalid_webhook_url_rejected_before_any_delivery() {
    let h = harness(MockClient::new(), MockTransport::with_status(200));
    let mut config = email_webhook_subscription();
    config.webhook = Some(WebhookConfig::new("not-a-url"));

    assert!(h.dispatcher.registry().register(config).is_err());
    assert!(h.store.is_empty());
}
