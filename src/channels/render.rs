//! Message rendering with event-data interpolation.

use crate::filters::lookup_path;
use crate::types::Event;
use serde_json::Value;

/// Replace `{{dotted.path}}` placeholders with values from the event
/// payload. `{{event.type}}` and `{{event.id}}` are built in; an
/// unresolvable placeholder renders as an empty string.
pub fn interpolate(template: &str, event: &Event) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                out.push_str(&resolve(path, event));
                rest = &after[end + 2..];
            }
            None => {
                // Unclosed placeholder: emit literally.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve(path: &str, event: &Event) -> String {
    match path {
        "event.type" => event.event_type.clone(),
        "event.id" => event.id.to_string(),
        _ => lookup_path(&event.payload, path)
            .map(value_to_text)
            .unwrap_or_default(),
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Default subject line when no template is configured.
pub fn default_subject(event: &Event) -> String {
    format!("Notification: {}", event.event_type)
}

/// Default body when no template is configured: the event type plus the
/// compact payload, which is enough for an operator to act on.
pub fn default_body(event: &Event) -> String {
    format!("{}\n{}", event.event_type, event.payload)
}
