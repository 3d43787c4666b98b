//! Subscription storage and matching.

use crate::error::{DispatchError, Result};
use crate::filters;
use crate::types::{Event, Subscription, SubscriptionConfig, SubscriptionId, Timestamp};
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Holds all subscriptions and answers match queries.
///
/// Subscriptions are immutable once stored; updates replace the whole
/// document. The `last_used` side table is the only thing the dispatch
/// path writes, so subscription reads need no coordination with it.
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
    /// Bookkeeping side table: when each subscription last matched an event.
    last_used: RwLock<HashMap<SubscriptionId, Timestamp>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            last_used: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscription. Rejects invalid configurations before
    /// they can enter the dispatch pipeline.
    pub fn register(&self, config: SubscriptionConfig) -> Result<SubscriptionId> {
        config.validate()?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let subscription = Arc::new(Subscription::from_config(id, config));
        self.subscriptions.write().insert(id, subscription);
        Ok(id)
    }

    /// Replace an existing subscription's configuration.
    pub fn update(&self, id: SubscriptionId, config: SubscriptionConfig) -> Result<()> {
        config.validate()?;
        let mut subs = self.subscriptions.write();
        if !subs.contains_key(&id) {
            return Err(DispatchError::SubscriptionNotFound(id));
        }
        subs.insert(id, Arc::new(Subscription::from_config(id, config)));
        Ok(())
    }

    /// Activate or deactivate a subscription. Deactivation also cancels any
    /// scheduled retries (the worker checks activity before a retry fires).
    pub fn set_active(&self, id: SubscriptionId, active: bool) -> Result<()> {
        let mut subs = self.subscriptions.write();
        let current = subs
            .get(&id)
            .ok_or(DispatchError::SubscriptionNotFound(id))?;
        if current.is_active != active {
            let mut updated = (**current).clone();
            updated.is_active = active;
            subs.insert(id, Arc::new(updated));
        }
        Ok(())
    }

    pub fn remove(&self, id: SubscriptionId) -> Result<()> {
        let mut subs = self.subscriptions.write();
        subs.remove(&id)
            .ok_or(DispatchError::SubscriptionNotFound(id))?;
        self.last_used.write().remove(&id);
        Ok(())
    }

    pub fn get(&self, id: SubscriptionId) -> Option<Arc<Subscription>> {
        self.subscriptions.read().get(&id).cloned()
    }

    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.subscriptions
            .read()
            .get(&id)
            .map(|s| s.is_active)
            .unwrap_or(false)
    }

    pub fn list(&self) -> Vec<Arc<Subscription>> {
        let mut all: Vec<_> = self.subscriptions.read().values().cloned().collect();
        all.sort_by_key(|s| s.id);
        all
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }

    /// When this subscription last matched an event.
    pub fn last_used(&self, id: SubscriptionId) -> Option<Timestamp> {
        self.last_used.read().get(&id).copied()
    }

    /// Return the active subscriptions matching an event: type in the
    /// subscription's event-type set and every filter passing. Ordered by
    /// priority descending, then id ascending.
    pub fn match_event(&self, event: &Event) -> Vec<Arc<Subscription>> {
        let mut matched: Vec<Arc<Subscription>> = {
            let subs = self.subscriptions.read();
            subs.values()
                .filter(|sub| sub.is_active)
                .filter(|sub| sub.event_types.iter().any(|t| t == &event.event_type))
                .filter(|sub| {
                    sub.filters
                        .iter()
                        .all(|filter| filters::evaluate(filter, &event.payload))
                })
                .cloned()
                .collect()
        };

        matched.sort_by_key(|sub| (Reverse(sub.priority), sub.id));

        if !matched.is_empty() {
            let now = Timestamp::now();
            let mut last_used = self.last_used.write();
            for sub in &matched {
                last_used.insert(sub.id, now);
            }
        }

        matched
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Filter, FilterOperator};
    use crate::types::{ChannelKind, EventMetadata, Priority, Recipients};
    use serde_json::json;

    fn telegram_config(name: &str, event_types: &[&str]) -> SubscriptionConfig {
        SubscriptionConfig {
            name: name.into(),
            event_types: event_types.iter().map(|s| s.to_string()).collect(),
            channels: vec![ChannelKind::Telegram],
            recipients: Recipients {
                telegram_chat_ids: vec!["12345".into()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn order_event(amount: i64) -> Event {
        Event::new(
            "order.created",
            json!({"data": {"amount": amount}}),
            EventMetadata::default(),
        )
    }

    #[test]
    fn test_register_and_match_by_type() {
        let registry = SubscriptionRegistry::new();
        let id = registry
            .register(telegram_config("orders", &["order.created"]))
            .unwrap();
        registry
            .register(telegram_config("leads", &["lead.created"]))
            .unwrap();

        let matched = registry.match_event(&order_event(10));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, id);
    }

    #[test]
    fn test_inactive_excluded() {
        let registry = SubscriptionRegistry::new();
        let id = registry
            .register(telegram_config("orders", &["order.created"]))
            .unwrap();
        registry.set_active(id, false).unwrap();

        assert!(registry.match_event(&order_event(10)).is_empty());
        assert!(!registry.is_active(id));
    }

    #[test]
    fn test_failing_filter_excluded() {
        let registry = SubscriptionRegistry::new();
        let mut config = telegram_config("big orders", &["order.created"]);
        config.filters = vec![Filter::new("data.amount", FilterOperator::Gt, json!(100))];
        registry.register(config).unwrap();

        assert!(registry.match_event(&order_event(50)).is_empty());
        assert_eq!(registry.match_event(&order_event(150)).len(), 1);
    }

    #[test]
    fn test_match_order_priority_then_id() {
        let registry = SubscriptionRegistry::new();

        let mut low = telegram_config("low", &["order.created"]);
        low.priority = Priority::Low;
        let mut critical = telegram_config("critical", &["order.created"]);
        critical.priority = Priority::Critical;
        let normal_a = telegram_config("normal-a", &["order.created"]);
        let normal_b = telegram_config("normal-b", &["order.created"]);

        let low_id = registry.register(low).unwrap();
        let critical_id = registry.register(critical).unwrap();
        let normal_a_id = registry.register(normal_a).unwrap();
        let normal_b_id = registry.register(normal_b).unwrap();

        let matched = registry.match_event(&order_event(10));
        let ids: Vec<_> = matched.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![critical_id, normal_a_id, normal_b_id, low_id]);
    }

    #[test]
    fn test_last_used_updated_on_match() {
        let registry = SubscriptionRegistry::new();
        let id = registry
            .register(telegram_config("orders", &["order.created"]))
            .unwrap();

        assert!(registry.last_used(id).is_none());
        registry.match_event(&order_event(10));
        assert!(registry.last_used(id).is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let registry = SubscriptionRegistry::new();
        let config = SubscriptionConfig {
            channels: vec![ChannelKind::Telegram],
            ..Default::default()
        };
        assert!(registry.register(config).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_replaces_document() {
        let registry = SubscriptionRegistry::new();
        let id = registry
            .register(telegram_config("orders", &["order.created"]))
            .unwrap();

        registry
            .update(id, telegram_config("orders", &["order.updated"]))
            .unwrap();

        assert!(registry.match_event(&order_event(10)).is_empty());
        assert_eq!(registry.get(id).unwrap().event_types, vec!["order.updated"]);
    }
}
