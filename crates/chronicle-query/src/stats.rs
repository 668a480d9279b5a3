use std::collections::BTreeMap;

use chronicle_ledger::LedgerEntry;
use chronicle_types::EventPayload;

/// Number of equal-width confidence buckets in the histogram.
pub const CONFIDENCE_BUCKETS: usize = 5;

/// On-demand aggregate view over the entry list.
///
/// Everything here is recomputed from the entries on each call; the ledger
/// keeps no running counters that could drift from the record of truth.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerStats {
    pub total_entries: u64,
    /// Entry counts keyed by category wire name.
    pub entries_by_type: BTreeMap<String, u64>,
    /// Mean exchange confidence; `None` when there are no exchanges.
    pub average_confidence: Option<f64>,
    /// Exchange counts in five 0.2-wide confidence buckets, low to high.
    pub confidence_histogram: [u64; CONFIDENCE_BUCKETS],
    /// How often each uncertainty flag appears across exchanges.
    pub uncertainty_flags: BTreeMap<String, u64>,
    /// Corrections divided by observational entries.
    pub correction_rate: f64,
    pub corrections_by_type: BTreeMap<String, u64>,
    /// Contexts by entry count, most active first.
    pub most_active_contexts: Vec<(String, u64)>,
}

impl LedgerStats {
    pub fn compute(entries: &[LedgerEntry]) -> Self {
        let mut entries_by_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut confidence_sum = 0.0;
        let mut confidence_count = 0u64;
        let mut confidence_histogram = [0u64; CONFIDENCE_BUCKETS];
        let mut uncertainty_flags: BTreeMap<String, u64> = BTreeMap::new();
        let mut corrections = 0u64;
        let mut observational = 0u64;
        let mut corrections_by_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut context_counts: BTreeMap<String, u64> = BTreeMap::new();

        for entry in entries {
            *entries_by_type
                .entry(entry.event_type.as_str().to_string())
                .or_default() += 1;
            *context_counts
                .entry(entry.context_id.as_str().to_string())
                .or_default() += 1;

            match &entry.payload {
                EventPayload::Exchange {
                    confidence,
                    uncertainty_flags: flags,
                    ..
                } => {
                    observational += 1;
                    confidence_sum += confidence;
                    confidence_count += 1;
                    let bucket = ((confidence * CONFIDENCE_BUCKETS as f64) as usize)
                        .min(CONFIDENCE_BUCKETS - 1);
                    confidence_histogram[bucket] += 1;
                    for flag in flags {
                        *uncertainty_flags.entry(flag.clone()).or_default() += 1;
                    }
                }
                EventPayload::Correction {
                    correction_type, ..
                } => {
                    corrections += 1;
                    *corrections_by_type
                        .entry(correction_type.as_str().to_string())
                        .or_default() += 1;
                }
                EventPayload::CorrectionConfirmed { .. } | EventPayload::AnchorCreated { .. } => {}
                _ => observational += 1,
            }
        }

        let average_confidence = if confidence_count > 0 {
            Some(confidence_sum / confidence_count as f64)
        } else {
            None
        };
        let correction_rate = if observational == 0 {
            0.0
        } else {
            corrections as f64 / observational as f64
        };

        let mut most_active_contexts: Vec<(String, u64)> = context_counts.into_iter().collect();
        most_active_contexts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            total_entries: entries.len() as u64,
            entries_by_type,
            average_confidence,
            confidence_histogram,
            uncertainty_flags,
            correction_rate,
            corrections_by_type,
            most_active_contexts,
        }
    }
}
