//! Payload filters for subscriptions.
//!
//! A filter addresses one field of an event payload via a dotted path
//! (e.g. `data.current.email`) and compares it against a configured value.
//! A subscription's filters are AND-combined by the matcher; an empty
//! filter list always matches.

mod eval;

pub use eval::{evaluate, lookup_path, Filter, FilterOperator};
