//! Plain-text rendering of ledger structures for operator display.
//!
//! The contract is a faithful, readable representation, not an exact format;
//! callers wanting structure should use the serde forms instead.

use std::fmt::Write;

use chronicle_ledger::{Anchor, AnchorCheck, ChainReport, LedgerEntry};
use chronicle_types::EventPayload;

/// One-line summary of an entry.
pub fn entry_line(entry: &LedgerEntry) -> String {
    let mut line = format!(
        "#{} {} [{}] by {} at {} hash {}",
        entry.sequence,
        entry.event_type,
        entry.context_id,
        entry.actor,
        entry.timestamp,
        entry.entry_hash.short_hex(),
    );
    match &entry.payload {
        EventPayload::Exchange {
            confidence,
            uncertainty_flags,
            ..
        } => {
            let _ = write!(line, " confidence {confidence:.2}");
            if !uncertainty_flags.is_empty() {
                let _ = write!(line, " flags [{}]", uncertainty_flags.join(", "));
            }
        }
        EventPayload::Correction {
            target_sequence,
            correction_type,
            validation_status,
            ..
        } => {
            let _ = write!(
                line,
                " target #{target_sequence} ({correction_type}, {validation_status})"
            );
        }
        EventPayload::AnchorCreated {
            anchor_id,
            sequence_range,
            ..
        } => {
            let _ = write!(line, " anchor {} over {}", anchor_id.short_id(), sequence_range);
        }
        _ => {}
    }
    line
}

/// Multi-line rendering of an entry including linkage and payload detail.
pub fn render_entry(entry: &LedgerEntry) -> String {
    let previous = entry
        .previous_hash
        .map(|h| h.short_hex())
        .unwrap_or_else(|| "(genesis)".into());
    format!(
        "{}\n  previous {}\n  signature {}…\n  {}\n",
        entry_line(entry),
        previous,
        &entry.signature.to_hex()[..16],
        entry.payload.text_content(),
    )
}

/// Render a chain of entries, one summary line each.
pub fn render_chain(entries: &[LedgerEntry]) -> String {
    if entries.is_empty() {
        return "(empty ledger)\n".into();
    }
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry_line(entry));
        out.push('\n');
    }
    out
}

/// Render an anchor checkpoint.
pub fn render_anchor(anchor: &Anchor) -> String {
    format!(
        "anchor {}\n  covers {}\n  root {}\n  created {}\n  reason: {}\n",
        anchor.anchor_id,
        anchor.sequence_range,
        anchor.root_hash.short_hex(),
        anchor.created_at,
        anchor.trigger_reason,
    )
}

/// Render a chain verification report.
pub fn render_chain_report(report: &ChainReport) -> String {
    if report.is_valid() {
        return format!("chain valid ({} entries checked)\n", report.checked);
    }
    let mut out = format!(
        "chain INVALID: {} violation(s) across {} entries, earliest at #{}\n",
        report.violations.len(),
        report.checked,
        report.first_violation().unwrap_or(0),
    );
    for violation in &report.violations {
        let _ = writeln!(
            out,
            "  #{} {:?}: {}",
            violation.sequence, violation.kind, violation.description
        );
    }
    out
}

/// Render an anchor cross-check result.
pub fn render_anchor_check(check: &AnchorCheck) -> String {
    let verdict = if check.matches {
        "intact"
    } else {
        "MISMATCH — covered entries were altered after the anchor was taken"
    };
    let recomputed = check
        .recomputed_root
        .map(|h| h.short_hex())
        .unwrap_or_else(|| "(covered entry missing)".into());
    format!(
        "anchor {} through #{}: {}\n  recorded root {}\n  recomputed    {}\n",
        check.anchor_id.short_id(),
        check.covered_sequence,
        verdict,
        check.expected_root.short_hex(),
        recomputed,
    )
}
