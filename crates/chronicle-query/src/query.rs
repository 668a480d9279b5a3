use serde_json::Value;

use chronicle_ledger::LedgerEntry;
use chronicle_types::{Actor, ContextId, EventType};

/// Comparison operator for payload-field filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Gt,
    Eq,
}

enum Filter {
    Type(EventType),
    Context(ContextId),
    Actor(Actor),
    PayloadField {
        field: String,
        cmp: Cmp,
        value: Value,
    },
    UncertaintyFlag(String),
}

/// Chainable query over an entry list.
///
/// Filters compose with AND semantics; terminal operations preserve chain
/// order. The query borrows the entry slice and never copies entries.
///
/// ```
/// # use chronicle_query::EntryQuery;
/// # use chronicle_types::EventType;
/// # let entries = vec![];
/// let low_confidence = EntryQuery::new(&entries)
///     .by_type(EventType::Exchange)
///     .where_payload("confidence", chronicle_query::Cmp::Lt, 0.5)
///     .has_uncertainty_flag("ambiguous")
///     .execute();
/// ```
pub struct EntryQuery<'a> {
    entries: &'a [LedgerEntry],
    filters: Vec<Filter>,
}

impl<'a> EntryQuery<'a> {
    pub fn new(entries: &'a [LedgerEntry]) -> Self {
        Self {
            entries,
            filters: Vec::new(),
        }
    }

    /// Keep only entries of the given category.
    pub fn by_type(mut self, event_type: EventType) -> Self {
        self.filters.push(Filter::Type(event_type));
        self
    }

    /// Keep only entries belonging to the given context.
    pub fn by_context(mut self, context_id: ContextId) -> Self {
        self.filters.push(Filter::Context(context_id));
        self
    }

    /// Keep only entries produced by the given actor.
    pub fn by_actor(mut self, actor: Actor) -> Self {
        self.filters.push(Filter::Actor(actor));
        self
    }

    /// Keep only entries whose payload field compares as requested.
    ///
    /// Entries whose payload lacks the field never match.
    pub fn where_payload(mut self, field: &str, cmp: Cmp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::PayloadField {
            field: field.to_string(),
            cmp,
            value: value.into(),
        });
        self
    }

    /// Keep only exchanges carrying the given uncertainty flag.
    pub fn has_uncertainty_flag(mut self, flag: &str) -> Self {
        self.filters.push(Filter::UncertaintyFlag(flag.to_string()));
        self
    }

    /// Materialize the filtered entries, order preserved.
    pub fn execute(&self) -> Vec<&'a LedgerEntry> {
        self.entries
            .iter()
            .filter(|entry| self.matches(entry))
            .collect()
    }

    /// Number of matching entries.
    pub fn count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| self.matches(entry))
            .count()
    }

    /// Earliest matching entry.
    pub fn first(&self) -> Option<&'a LedgerEntry> {
        self.entries.iter().find(|entry| self.matches(entry))
    }

    /// Latest matching entry.
    pub fn last(&self) -> Option<&'a LedgerEntry> {
        self.entries.iter().rev().find(|entry| self.matches(entry))
    }

    fn matches(&self, entry: &LedgerEntry) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Type(t) => entry.event_type == *t,
            Filter::Context(c) => entry.context_id == *c,
            Filter::Actor(a) => entry.actor == *a,
            Filter::UncertaintyFlag(flag) => entry
                .payload
                .uncertainty_flags()
                .is_some_and(|flags| flags.iter().any(|f| f == flag)),
            Filter::PayloadField { field, cmp, value } => {
                payload_field(entry, field).is_some_and(|actual| compare(*cmp, &actual, value))
            }
        })
    }
}

/// Extract a named field from the payload object.
///
/// Payloads are externally tagged, so the field lives one level below the
/// category key.
fn payload_field(entry: &LedgerEntry, field: &str) -> Option<Value> {
    let value = serde_json::to_value(&entry.payload).ok()?;
    value
        .as_object()?
        .values()
        .next()?
        .get(field)
        .cloned()
}

fn compare(cmp: Cmp, actual: &Value, expected: &Value) -> bool {
    match cmp {
        Cmp::Eq => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => actual == expected,
        },
        Cmp::Lt => matches!(
            (actual.as_f64(), expected.as_f64()),
            (Some(a), Some(b)) if a < b
        ),
        Cmp::Gt => matches!(
            (actual.as_f64(), expected.as_f64()),
            (Some(a), Some(b)) if a > b
        ),
    }
}

/// Entries of the given category, order preserved.
pub fn by_type<'a>(entries: &'a [LedgerEntry], event_type: EventType) -> Vec<&'a LedgerEntry> {
    entries
        .iter()
        .filter(|e| e.event_type == event_type)
        .collect()
}

/// Entries belonging to the given context.
pub fn by_context<'a>(entries: &'a [LedgerEntry], context_id: &ContextId) -> Vec<&'a LedgerEntry> {
    entries
        .iter()
        .filter(|e| e.context_id == *context_id)
        .collect()
}

/// Entries produced by the given actor.
pub fn by_actor<'a>(entries: &'a [LedgerEntry], actor: &Actor) -> Vec<&'a LedgerEntry> {
    entries.iter().filter(|e| e.actor == *actor).collect()
}

/// Correction entries targeting the given sequence.
pub fn corrections_for(entries: &[LedgerEntry], sequence: u64) -> Vec<&LedgerEntry> {
    entries
        .iter()
        .filter(|e| e.payload.correction_target() == Some(sequence))
        .collect()
}

/// Exchanges whose confidence falls strictly below the threshold.
pub fn below_confidence(entries: &[LedgerEntry], threshold: f64) -> Vec<&LedgerEntry> {
    entries
        .iter()
        .filter(|e| e.payload.confidence().is_some_and(|c| c < threshold))
        .collect()
}
