//! Webhook channel sender.
//!
//! Builds the outbound HTTP POST (JSON body, default and custom headers,
//! optional HMAC-SHA256 signature), hands it to the injected
//! [`HttpTransport`], and produces one [`WebhookCallRecord`] per physical
//! call regardless of outcome.

use super::{ChannelSender, DeliveryOutcome};
use crate::audit::{TimingBreakdown, WebhookCallRecord, WebhookCallStatus};
use crate::types::{ChannelKind, Event, Subscription, Timestamp, WebhookConfig};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;

/// Header carrying the hex HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Default User-Agent for outbound webhooks.
pub const USER_AGENT: &str = "Courier-Webhook/1.0";

/// One outbound webhook HTTP request.
#[derive(Clone, Debug)]
pub struct WebhookRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub timeout: Duration,
}

/// Transport-level response, including the timing breakdown the transport
/// measured while executing the call.
#[derive(Clone, Debug)]
pub struct WebhookResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub timing: TimingBreakdown,
    pub response_time_ms: u64,
}

/// Transport-level failure.
#[derive(Clone, Debug)]
pub enum TransportError {
    /// The configured timeout elapsed before a response arrived.
    Timeout { elapsed_ms: u64 },
    /// DNS, connect, TLS, or mid-stream failure.
    Network { message: String, elapsed_ms: u64 },
}

/// Pluggable HTTP client for webhook delivery. Implementations must honor
/// `request.timeout` and fill in the timing breakdown.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: &WebhookRequest) -> std::result::Result<WebhookResponse, TransportError>;
}

/// Hex HMAC-SHA256 of the raw body under the subscription secret.
pub fn sign_body(secret: &str, body: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub struct WebhookSender {
    transport: std::sync::Arc<dyn HttpTransport>,
}

impl WebhookSender {
    pub fn new(transport: std::sync::Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn build_request(&self, config: &WebhookConfig, event: &Event) -> (WebhookRequest, Option<String>) {
        let body = json!({
            "eventId": event.id,
            "eventType": event.event_type,
            "occurredAt": event.occurred_at,
            "data": event.payload,
            "metadata": event.metadata,
        })
        .to_string();

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        for (name, value) in &config.headers {
            headers.push((name.clone(), value.clone()));
        }

        let signature = config.secret.as_deref().map(|secret| sign_body(secret, &body));
        if let Some(sig) = &signature {
            headers.push((SIGNATURE_HEADER.to_string(), sig.clone()));
        }

        (
            WebhookRequest {
                url: config.url.clone(),
                headers,
                body,
                timeout: Duration::from_millis(config.timeout_ms),
            },
            signature,
        )
    }
}

impl ChannelSender for WebhookSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn send(&self, subscription: &Subscription, event: &Event) -> DeliveryOutcome {
        let config = match &subscription.webhook {
            Some(config) => config,
            // Validation rejects this at save time; a stale document still
            // must not panic the worker.
            None => return DeliveryOutcome::failed("webhook channel enabled without webhook settings"),
        };

        let (request, signature) = self.build_request(config, event);

        let mut call = WebhookCallRecord {
            url: request.url.clone(),
            event_id: event.id,
            event_type: event.event_type.clone(),
            subscription_id: subscription.id,
            status: WebhookCallStatus::Failed,
            status_code: None,
            attempt: 0, // filled by the delivery logger
            response_time_ms: 0,
            error: None,
            request_headers: request.headers.clone(),
            request_body: request.body.clone(),
            response_headers: None,
            response_body: None,
            signature,
            timing: TimingBreakdown::default(),
            recorded_at: Timestamp::now(),
        };

        match self.transport.execute(&request) {
            Ok(response) => {
                let success = (200..300).contains(&response.status_code);
                call.status = if success {
                    WebhookCallStatus::Success
                } else {
                    WebhookCallStatus::Failed
                };
                call.status_code = Some(response.status_code);
                call.response_time_ms = response.response_time_ms;
                call.timing = response.timing;
                call.response_headers = Some(response.headers.clone());
                call.response_body = Some(response.body.clone());
                if !success {
                    call.error = Some(format!("non-2xx response: {}", response.status_code));
                }

                DeliveryOutcome {
                    success,
                    response: Some(response.body),
                    error: call.error.clone(),
                    status_code: Some(response.status_code),
                    webhook_call: Some(call),
                }
            }
            Err(TransportError::Timeout { elapsed_ms }) => {
                call.status = WebhookCallStatus::Timeout;
                call.response_time_ms = elapsed_ms;
                call.error = Some(format!("timed out after {elapsed_ms} ms"));

                DeliveryOutcome {
                    success: false,
                    response: None,
                    error: call.error.clone(),
                    status_code: None,
                    webhook_call: Some(call),
                }
            }
            Err(TransportError::Network { message, elapsed_ms }) => {
                call.response_time_ms = elapsed_ms;
                call.error = Some(message.clone());

                DeliveryOutcome {
                    success: false,
                    response: None,
                    error: Some(message),
                    status_code: None,
                    webhook_call: Some(call),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// Scripted transport: pops responses front-to-back and records every
    /// request it saw.
    pub struct ScriptedTransport {
        pub requests: Mutex<Vec<WebhookRequest>>,
        pub script: Mutex<Vec<std::result::Result<WebhookResponse, TransportError>>>,
        default_status: Option<u16>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<std::result::Result<WebhookResponse, TransportError>>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                script: Mutex::new(script),
                default_status: Some(200),
            }
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn execute(
            &self,
            request: &WebhookRequest,
        ) -> std::result::Result<WebhookResponse, TransportError> {
            self.requests.lock().push(request.clone());
            let mut script = self.script.lock();
            if script.is_empty() {
                return Ok(ok_response(self.default_status.unwrap_or(200)));
            }
            script.remove(0)
        }
    }

    pub fn ok_response(status_code: u16) -> WebhookResponse {
        WebhookResponse {
            status_code,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: "{\"received\":true}".into(),
            timing: TimingBreakdown {
                dns_ms: 2,
                connect_ms: 5,
                tls_ms: 8,
                ttfb_ms: 20,
            },
            response_time_ms: 35,
        }
    }
}
