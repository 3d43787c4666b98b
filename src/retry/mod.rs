//! Retry scheduling.
//!
//! Failed attempts re-enter the worker queue after the backoff delay
//! computed from the subscription's [`crate::types::RetryPolicy`]. The
//! scheduler is a time-ordered heap drained by one background thread.

mod scheduler;

pub(crate) use scheduler::RetryScheduler;
