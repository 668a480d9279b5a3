//! Read-only query, statistics, and rendering surface over the Chronicle
//! ledger.
//!
//! - [`EntryQuery`] — chainable filter builder with AND semantics
//! - Flat accessors (`by_type`, `by_context`, `by_actor`, `corrections_for`,
//!   `below_confidence`)
//! - [`LedgerStats`] — on-demand aggregate statistics
//! - [`render`] — human-readable text for entries, chains, anchors, and
//!   verification results

pub mod query;
pub mod render;
pub mod stats;

pub use query::{
    below_confidence, by_actor, by_context, by_type, corrections_for, Cmp, EntryQuery,
};
pub use stats::{LedgerStats, CONFIDENCE_BUCKETS};
