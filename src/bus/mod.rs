//! Event bus / dispatcher.
//!
//! The entry point of the engine: producers call
//! [`Dispatcher::publish`], which matches subscriptions, writes pending
//! delivery records, and fans one task per `(subscription, channel)` pair
//! out to a priority-aware worker pool. Failures never propagate back to
//! the producer; they live in the audit records.

mod dispatcher;
pub(crate) mod task;

pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherStats, EventPublisher};
