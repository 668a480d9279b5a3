use serde::Serialize;

use chronicle_crypto::VerifyingKey;
use chronicle_types::{AnchorId, Digest};

use crate::anchor::Anchor;
use crate::entry::LedgerEntry;
use crate::error::LedgerError;
use crate::ledger::Ledger;

/// A specific integrity violation detected during a chain walk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainViolation {
    /// Sequence of the offending entry.
    pub sequence: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Sequence numbering is not 1, 2, 3, … (insertion, deletion, or swap).
    SequenceGap,
    /// First entry carries a previous hash.
    GenesisHasPreviousHash,
    /// A non-first entry has no previous hash.
    MissingPreviousHash,
    /// `previous_hash` does not match the prior entry's stored hash.
    BrokenLink,
    /// Stored `entry_hash` does not match the hash recomputed from current
    /// content.
    HashMismatch,
    /// Signature does not verify under the currently configured key.
    BadSignature,
}

/// Result of a full chain walk. Validity is a query, not an exception:
/// violations are data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Number of entries walked.
    pub checked: u64,
    /// Every violation found, in walk order.
    pub violations: Vec<ChainViolation>,
}

impl ChainReport {
    /// Returns `true` if no violation was found. An empty log is valid.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Sequence of the earliest offending entry, if any.
    pub fn first_violation(&self) -> Option<u64> {
        self.violations.first().map(|v| v.sequence)
    }
}

/// Result of checking current ledger content against an anchor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnchorCheck {
    pub anchor_id: AnchorId,
    /// The sequence the anchor's root hash covers.
    pub covered_sequence: u64,
    /// Root hash recorded when the anchor was taken.
    pub expected_root: Digest,
    /// Hash recomputed from the covered entry's current content; `None` when
    /// the entry is no longer resolvable.
    pub recomputed_root: Option<Digest>,
    /// `true` only if the recomputed hash equals the recorded root.
    pub matches: bool,
}

/// Walk a chain of entries in order, rechecking every link.
///
/// Per entry: sequence continuity, previous-hash linkage, recomputed entry
/// hash against the stored one, and the signature under `key`. Detects
/// edited payloads, edited or missing link hashes, inserted, deleted, or
/// swapped entries, and entries signed under a foreign key; the earliest
/// offending entry comes first in the report. Corrections receive no special
/// treatment — the walk covers the physical chain only, so a correction can
/// never mask a tamper.
pub fn verify_entries(entries: &[LedgerEntry], key: &VerifyingKey) -> ChainReport {
    let mut violations = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let expected_seq = (index + 1) as u64;
        if entry.sequence != expected_seq {
            violations.push(ChainViolation {
                sequence: entry.sequence,
                kind: ViolationKind::SequenceGap,
                description: format!("expected seq {expected_seq}, found {}", entry.sequence),
            });
        }

        match (index, entry.previous_hash) {
            (0, None) => {}
            (0, Some(_)) => violations.push(ChainViolation {
                sequence: entry.sequence,
                kind: ViolationKind::GenesisHasPreviousHash,
                description: "first entry carries a previous hash".into(),
            }),
            (_, None) => violations.push(ChainViolation {
                sequence: entry.sequence,
                kind: ViolationKind::MissingPreviousHash,
                description: "entry has no previous hash".into(),
            }),
            (i, Some(prev)) => {
                if prev != entries[i - 1].entry_hash {
                    violations.push(ChainViolation {
                        sequence: entry.sequence,
                        kind: ViolationKind::BrokenLink,
                        description: "previous hash link mismatch".into(),
                    });
                }
            }
        }

        match entry.compute_hash() {
            Ok(computed) if computed == entry.entry_hash => {}
            Ok(_) => violations.push(ChainViolation {
                sequence: entry.sequence,
                kind: ViolationKind::HashMismatch,
                description: "stored hash does not match recomputed content".into(),
            }),
            Err(e) => violations.push(ChainViolation {
                sequence: entry.sequence,
                kind: ViolationKind::HashMismatch,
                description: format!("canonical serialization failed: {e}"),
            }),
        }

        let signature_ok = entry
            .signing_bytes()
            .map(|bytes| key.verify(&bytes, &entry.signature).is_ok())
            .unwrap_or(false);
        if !signature_ok {
            violations.push(ChainViolation {
                sequence: entry.sequence,
                kind: ViolationKind::BadSignature,
                description: "signature does not verify under the configured key".into(),
            });
        }
    }

    ChainReport {
        checked: entries.len() as u64,
        violations,
    }
}

impl Ledger {
    /// Walk the physical chain and recheck every entry against the ledger's
    /// currently configured key.
    pub fn verify_chain(&self) -> ChainReport {
        verify_entries(&self.entries, &self.verifying_key())
    }

    /// Re-derive the anchored root hash from the current content of the
    /// covered entries and compare against the anchor's recorded root.
    ///
    /// The whole covered prefix is rehashed with each recomputed hash fed
    /// forward as the next entry's previous hash, so an edit anywhere at or
    /// below `sequence_range.last` changes the recomputed root. A mismatch
    /// proves something covered by the anchor was altered after the anchor
    /// was taken; entries appended after the anchor do not affect the check.
    /// A missing covered entry is a failed check, not an error.
    pub fn verify_against_anchor(&self, anchor: &Anchor) -> Result<AnchorCheck, LedgerError> {
        let covered_sequence = anchor.sequence_range.last;
        let mut rolling = self
            .entry(anchor.sequence_range.first)
            .and_then(|e| e.previous_hash);
        let mut resolvable = true;

        for sequence in anchor.sequence_range.first..=covered_sequence {
            match self.entry(sequence) {
                Some(entry) => rolling = Some(entry.compute_hash_with_previous(rolling)?),
                None => {
                    resolvable = false;
                    break;
                }
            }
        }

        let recomputed_root = if resolvable { rolling } else { None };
        Ok(AnchorCheck {
            anchor_id: anchor.anchor_id.clone(),
            covered_sequence,
            expected_root: anchor.root_hash,
            recomputed_root,
            matches: recomputed_root == Some(anchor.root_hash),
        })
    }
}

#[cfg(test)]
mod tests {
    use chronicle_crypto::SigningKey;
    use chronicle_types::{Actor, ContextId, CorrectionType, Digest, EventPayload};

    use super::*;

    fn exchange(i: u64) -> EventPayload {
        EventPayload::Exchange {
            query: format!("question {i}"),
            response: format!("answer {i}"),
            response_hash: "beef".into(),
            confidence: 0.9,
            uncertainty_flags: vec![],
        }
    }

    fn seeded(dir: &std::path::Path, count: u64) -> Ledger {
        let mut ledger = Ledger::open(dir).unwrap();
        ledger
            .append(
                ContextId::new("ctx"),
                Actor::System,
                EventPayload::SessionStart {
                    session_label: "verify tests".into(),
                    participants: vec![],
                },
            )
            .unwrap();
        for i in 1..count {
            ledger
                .append(ContextId::new("ctx"), Actor::Assistant, exchange(i))
                .unwrap();
        }
        ledger
    }

    #[test]
    fn empty_log_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        let report = ledger.verify_chain();
        assert!(report.is_valid());
        assert_eq!(report.first_violation(), None);
        assert_eq!(report.checked, 0);
    }

    #[test]
    fn untampered_log_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(dir.path(), 5);
        let report = ledger.verify_chain();
        assert!(report.is_valid());
        assert_eq!(report.checked, 5);
    }

    #[test]
    fn tampered_payload_reports_that_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 5);
        let original = ledger.entries[2].payload.clone();

        ledger.entries[2].payload = exchange(99);
        let report = ledger.verify_chain();
        assert!(!report.is_valid());
        assert_eq!(report.first_violation(), Some(3));

        // Restoring the original content restores validity.
        ledger.entries[2].payload = original;
        assert!(ledger.verify_chain().is_valid());
    }

    #[test]
    fn tampered_previous_hash_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 4);
        ledger.entries[2].previous_hash = Some(Digest::from_hash([0xaa; 32]));

        let report = ledger.verify_chain();
        assert_eq!(report.first_violation(), Some(3));
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::BrokenLink));
    }

    #[test]
    fn tampered_stored_hash_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 4);
        ledger.entries[1].entry_hash = Digest::from_hash([0xbb; 32]);

        let report = ledger.verify_chain();
        assert_eq!(report.first_violation(), Some(2));
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::HashMismatch));
    }

    #[test]
    fn deleted_entry_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 5);
        ledger.entries.remove(2);

        let report = ledger.verify_chain();
        assert!(!report.is_valid());
        assert_eq!(report.first_violation(), Some(4));
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::SequenceGap));
    }

    #[test]
    fn swapped_entries_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 5);
        ledger.entries.swap(1, 2);

        let report = ledger.verify_chain();
        assert!(!report.is_valid());
        assert_eq!(report.first_violation(), Some(3));
    }

    #[test]
    fn entry_signed_under_foreign_key_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 4);

        // Re-sign entry 2 with a rogue key and repair its stored hash so only
        // the signature check can catch it.
        let rogue = SigningKey::generate();
        let bytes = ledger.entries[1].signing_bytes().unwrap();
        ledger.entries[1].signature = rogue.sign(&bytes);
        let repaired = ledger.entries[1].compute_hash().unwrap();
        ledger.entries[1].entry_hash = repaired;

        let report = ledger.verify_chain();
        assert!(!report.is_valid());
        let first = &report.violations[0];
        assert_eq!(first.sequence, 2);
        assert_eq!(first.kind, ViolationKind::BadSignature);
    }

    #[test]
    fn corrections_never_mask_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 4);
        let target_hash = ledger.entries[1].entry_hash;

        for _ in 0..3 {
            ledger
                .log_correction_forced(
                    ContextId::new("ctx"),
                    Actor::Human,
                    2,
                    CorrectionType::Factual,
                    "answer 1 was wrong, the real answer differs",
                )
                .unwrap();
        }
        // Referencing entry 2 never changes its stored hash.
        assert_eq!(ledger.entries[1].entry_hash, target_hash);
        assert!(ledger.verify_chain().is_valid());

        ledger.entries[1].payload = exchange(77);
        let report = ledger.verify_chain();
        assert!(!report.is_valid());
        assert_eq!(report.first_violation(), Some(2));
    }

    #[test]
    fn anchor_check_detects_pre_anchor_tamper() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 5);
        let anchor = ledger.create_anchor("coverage test").unwrap();

        // Appends after the anchor do not affect the check.
        for i in 0..2 {
            ledger
                .append(ContextId::new("ctx"), Actor::Assistant, exchange(10 + i))
                .unwrap();
        }
        assert!(ledger.verify_against_anchor(&anchor).unwrap().matches);

        // Tampering entry 2, below the anchored head, propagates into the
        // recomputed root.
        ledger.entries[1].payload = exchange(55);
        let check = ledger.verify_against_anchor(&anchor).unwrap();
        assert!(!check.matches);
        assert_eq!(check.expected_root, anchor.root_hash);
        assert_ne!(check.recomputed_root, Some(anchor.root_hash));
    }

    #[test]
    fn anchor_check_with_missing_covered_entry_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 3);
        let anchor = ledger.create_anchor("before loss").unwrap();

        ledger.entries.clear();
        let check = ledger.verify_against_anchor(&anchor).unwrap();
        assert!(!check.matches);
        assert!(check.recomputed_root.is_none());
    }
}
