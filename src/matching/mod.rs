//! Subscription registry and event matching.
//!
//! The registry is the persisted-configuration surface: subscriptions are
//! validated on every write and read-only from the dispatch path. The
//! matcher selects active subscriptions whose event-type set and filters
//! accept an event, ordered by priority (descending) then id (ascending).

mod registry;

pub use registry::SubscriptionRegistry;
