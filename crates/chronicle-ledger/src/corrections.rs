use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::debug;

use chronicle_types::{
    Actor, ContextId, CorrectionType, EventPayload, EventType, ValidationStatus,
};

use crate::entry::LedgerEntry;
use crate::error::LedgerError;
use crate::ledger::Ledger;

/// Minimum token-overlap score before a correction is considered related to
/// its target.
const RELATEDNESS_THRESHOLD: f64 = 0.2;

/// Result of validating a correction against its target before logging.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrectionCheck {
    pub target_sequence: u64,
    /// Token-overlap score between correction text and target text, in [0, 1].
    pub relatedness: f64,
    /// Soft warnings; these block logging unless explicitly forced.
    pub warnings: Vec<String>,
}

/// A problem surfaced by the correction audit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrectionFinding {
    /// Sequence of the correction entry.
    pub sequence: u64,
    pub target_sequence: u64,
    pub kind: CorrectionFindingKind,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionFindingKind {
    /// Never validated, and no human confirmation either.
    StillPending,
    /// The target sequence is no longer resolvable (lossy recovery).
    OrphanedTarget,
    /// The relatedness re-check fell below the acceptance threshold.
    LowRelatedness,
}

/// On-demand aggregate view of correction activity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrectionAnalytics {
    pub total_corrections: u64,
    /// Entries that record observations, excluding corrections,
    /// confirmations, and anchor bookkeeping.
    pub observational_entries: u64,
    /// Corrections divided by observational entries; 0 when there is nothing
    /// to observe.
    pub correction_rate: f64,
    pub corrections_by_type: BTreeMap<String, u64>,
    /// Distribution of *effective* statuses: a later confirmation entry
    /// upgrades the status its target reports here.
    pub status_distribution: BTreeMap<String, u64>,
}

impl Ledger {
    /// Validate a prospective correction against its target.
    ///
    /// A missing target is a hard error. A correction whose text shares too
    /// little vocabulary with the target's is flagged with a warning — a
    /// correction pointing at the wrong entry is itself a data-quality
    /// hazard.
    pub fn validate_correction_target(
        &self,
        target_sequence: u64,
        correction_text: &str,
    ) -> Result<CorrectionCheck, LedgerError> {
        let target = self
            .entry(target_sequence)
            .ok_or(LedgerError::MissingCorrectionTarget {
                target: target_sequence,
            })?;

        let relatedness = relatedness(correction_text, &target.payload.text_content());
        let mut warnings = Vec::new();
        if relatedness < RELATEDNESS_THRESHOLD {
            warnings.push(format!(
                "correction text appears unrelated to entry {target_sequence} \
                 (relatedness {relatedness:.2})"
            ));
        }

        Ok(CorrectionCheck {
            target_sequence,
            relatedness,
            warnings,
        })
    }

    /// Validate and append a correction entry.
    ///
    /// Hard validation errors always refuse; unresolved warnings block
    /// unless [`log_correction_forced`](Self::log_correction_forced) is used.
    /// The logged entry carries its validation metadata.
    pub fn log_correction(
        &mut self,
        context_id: ContextId,
        actor: Actor,
        target_sequence: u64,
        correction_type: CorrectionType,
        notes: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        self.log_correction_inner(context_id, actor, target_sequence, correction_type, notes, false)
    }

    /// Like [`log_correction`](Self::log_correction), but appends even when
    /// relatedness warnings remain. The warnings are still recorded on the
    /// entry.
    pub fn log_correction_forced(
        &mut self,
        context_id: ContextId,
        actor: Actor,
        target_sequence: u64,
        correction_type: CorrectionType,
        notes: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        self.log_correction_inner(context_id, actor, target_sequence, correction_type, notes, true)
    }

    fn log_correction_inner(
        &mut self,
        context_id: ContextId,
        actor: Actor,
        target_sequence: u64,
        correction_type: CorrectionType,
        notes: &str,
        force: bool,
    ) -> Result<LedgerEntry, LedgerError> {
        let check = self.validate_correction_target(target_sequence, notes)?;
        if !force && !check.warnings.is_empty() {
            return Err(LedgerError::CorrectionBlocked {
                target: target_sequence,
                warnings: check.warnings,
            });
        }

        let entry = self.append(
            context_id,
            actor,
            EventPayload::Correction {
                target_sequence,
                correction_type,
                correction_notes: notes.to_string(),
                validation_status: ValidationStatus::Validated,
                relatedness: check.relatedness,
                validation_warnings: check.warnings,
            },
        )?;
        debug!(
            sequence = entry.sequence,
            target = target_sequence,
            kind = %correction_type,
            "correction logged"
        );
        Ok(entry)
    }

    /// Append a human sign-off upgrading a correction to `human_confirmed`.
    ///
    /// The upgrade is itself a `correction_confirmed` entry referencing the
    /// correction; nothing is mutated in place. Refuses when the referenced
    /// sequence is not a correction.
    pub fn confirm_correction(
        &mut self,
        correction_sequence: u64,
        confirmed_by: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let correction = self
            .entry(correction_sequence)
            .filter(|e| e.event_type == EventType::Correction)
            .ok_or(LedgerError::NotACorrection {
                sequence: correction_sequence,
            })?;
        let context_id = correction.context_id.clone();

        self.append(
            context_id,
            Actor::Human,
            EventPayload::CorrectionConfirmed {
                correction_sequence,
                confirmed_by: confirmed_by.to_string(),
            },
        )
    }

    /// Flag corrections that are still pending, orphaned, or failing the
    /// relatedness re-check.
    pub fn audit_corrections(&self) -> Vec<CorrectionFinding> {
        let confirmed = self.confirmed_sequences();
        let mut findings = Vec::new();

        for entry in &self.entries {
            let EventPayload::Correction {
                target_sequence,
                correction_notes,
                validation_status,
                ..
            } = &entry.payload
            else {
                continue;
            };

            let effective = if confirmed.contains(&entry.sequence) {
                ValidationStatus::HumanConfirmed
            } else {
                *validation_status
            };
            if effective == ValidationStatus::Pending {
                findings.push(CorrectionFinding {
                    sequence: entry.sequence,
                    target_sequence: *target_sequence,
                    kind: CorrectionFindingKind::StillPending,
                    detail: "correction was never validated or confirmed".into(),
                });
            }

            match self.entry(*target_sequence) {
                None => findings.push(CorrectionFinding {
                    sequence: entry.sequence,
                    target_sequence: *target_sequence,
                    kind: CorrectionFindingKind::OrphanedTarget,
                    detail: format!("target entry {target_sequence} is no longer resolvable"),
                }),
                Some(target) => {
                    let score = relatedness(correction_notes, &target.payload.text_content());
                    if score < RELATEDNESS_THRESHOLD {
                        findings.push(CorrectionFinding {
                            sequence: entry.sequence,
                            target_sequence: *target_sequence,
                            kind: CorrectionFindingKind::LowRelatedness,
                            detail: format!("relatedness re-check scored {score:.2}"),
                        });
                    }
                }
            }
        }

        findings
    }

    /// Compute correction analytics over the current entry list.
    pub fn correction_analytics(&self) -> CorrectionAnalytics {
        let confirmed = self.confirmed_sequences();
        let mut total_corrections = 0u64;
        let mut observational = 0u64;
        let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_status: BTreeMap<String, u64> = BTreeMap::new();

        for entry in &self.entries {
            match &entry.payload {
                EventPayload::Correction {
                    correction_type,
                    validation_status,
                    ..
                } => {
                    total_corrections += 1;
                    *by_type.entry(correction_type.as_str().to_string()).or_default() += 1;
                    let effective = if confirmed.contains(&entry.sequence) {
                        ValidationStatus::HumanConfirmed
                    } else {
                        *validation_status
                    };
                    *by_status.entry(effective.as_str().to_string()).or_default() += 1;
                }
                EventPayload::CorrectionConfirmed { .. } | EventPayload::AnchorCreated { .. } => {}
                _ => observational += 1,
            }
        }

        let correction_rate = if observational == 0 {
            0.0
        } else {
            total_corrections as f64 / observational as f64
        };

        CorrectionAnalytics {
            total_corrections,
            observational_entries: observational,
            correction_rate,
            corrections_by_type: by_type,
            status_distribution: by_status,
        }
    }

    /// All entries that record a correction against the given sequence.
    pub fn corrections_for(&self, sequence: u64) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.payload.correction_target() == Some(sequence))
            .collect()
    }

    fn confirmed_sequences(&self) -> HashSet<u64> {
        self.entries
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::CorrectionConfirmed {
                    correction_sequence,
                    ..
                } => Some(*correction_sequence),
                _ => None,
            })
            .collect()
    }
}

/// Token-overlap relatedness between a correction's text and its target's.
///
/// Lowercased alphanumeric tokens of three or more characters; the score is
/// the share of correction tokens also present in the target.
fn relatedness(correction: &str, target: &str) -> f64 {
    let correction_tokens = tokenize(correction);
    if correction_tokens.is_empty() {
        return 0.0;
    }
    let target_tokens = tokenize(target);
    let shared = correction_tokens.intersection(&target_tokens).count();
    shared as f64 / correction_tokens.len() as f64
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(dir: &std::path::Path) -> Ledger {
        let mut ledger = Ledger::open(dir).unwrap();
        ledger
            .append(
                ContextId::new("research"),
                Actor::System,
                EventPayload::SessionStart {
                    session_label: "correction tests".into(),
                    participants: vec![],
                },
            )
            .unwrap();
        ledger
            .append(
                ContextId::new("research"),
                Actor::Assistant,
                EventPayload::Exchange {
                    query: "when was the treaty of westphalia signed".into(),
                    response: "the treaty of westphalia was signed in 1658".into(),
                    response_hash: "0ddba11".into(),
                    confidence: 0.7,
                    uncertainty_flags: vec![],
                },
            )
            .unwrap();
        ledger
    }

    #[test]
    fn missing_target_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(dir.path());
        let err = ledger
            .validate_correction_target(42, "the treaty date was wrong")
            .unwrap_err();
        assert_eq!(err, LedgerError::MissingCorrectionTarget { target: 42 });
    }

    #[test]
    fn related_correction_passes_validation() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(dir.path());
        let check = ledger
            .validate_correction_target(2, "the treaty of westphalia was signed in 1648, not 1658")
            .unwrap();
        assert!(check.warnings.is_empty());
        assert!(check.relatedness >= RELATEDNESS_THRESHOLD);
    }

    #[test]
    fn unrelated_correction_warns_and_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path());

        let check = ledger
            .validate_correction_target(2, "my favourite soup recipe needs more paprika")
            .unwrap();
        assert_eq!(check.warnings.len(), 1);

        let err = ledger
            .log_correction(
                ContextId::new("research"),
                Actor::Human,
                2,
                CorrectionType::Factual,
                "my favourite soup recipe needs more paprika",
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::CorrectionBlocked { target: 2, .. }));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn forced_correction_records_its_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path());

        let entry = ledger
            .log_correction_forced(
                ContextId::new("research"),
                Actor::Human,
                2,
                CorrectionType::Clarification,
                "my favourite soup recipe needs more paprika",
            )
            .unwrap();
        match &entry.payload {
            EventPayload::Correction {
                validation_status,
                validation_warnings,
                ..
            } => {
                assert_eq!(*validation_status, ValidationStatus::Validated);
                assert_eq!(validation_warnings.len(), 1);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn correction_never_modifies_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path());
        let target = ledger.entry(2).unwrap().clone();

        ledger
            .log_correction(
                ContextId::new("research"),
                Actor::Human,
                2,
                CorrectionType::Factual,
                "the treaty of westphalia was signed in 1648",
            )
            .unwrap();
        assert_eq!(ledger.entry(2).unwrap(), &target);
        assert_eq!(ledger.corrections_for(2).len(), 1);
    }

    #[test]
    fn confirm_upgrades_via_follow_on_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path());
        let correction = ledger
            .log_correction(
                ContextId::new("research"),
                Actor::Human,
                2,
                CorrectionType::Factual,
                "the treaty of westphalia was signed in 1648",
            )
            .unwrap();

        let confirmation = ledger
            .confirm_correction(correction.sequence, "alex")
            .unwrap();
        assert_eq!(confirmation.event_type, EventType::CorrectionConfirmed);

        // The correction entry itself is untouched; only the effective
        // status reported by analytics changes.
        match &ledger.entry(correction.sequence).unwrap().payload {
            EventPayload::Correction {
                validation_status, ..
            } => assert_eq!(*validation_status, ValidationStatus::Validated),
            other => panic!("unexpected payload {other:?}"),
        }
        let analytics = ledger.correction_analytics();
        assert_eq!(analytics.status_distribution.get("human_confirmed"), Some(&1));
    }

    #[test]
    fn confirm_refuses_non_corrections() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path());
        let err = ledger.confirm_correction(2, "alex").unwrap_err();
        assert_eq!(err, LedgerError::NotACorrection { sequence: 2 });
    }

    #[test]
    fn audit_flags_pending_and_unrelated_corrections() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path());

        // A producer-supplied correction that skipped validation.
        ledger
            .append(
                ContextId::new("research"),
                Actor::Agent("validator".into()),
                EventPayload::Correction {
                    target_sequence: 2,
                    correction_type: CorrectionType::Outdated,
                    correction_notes: "completely different subject matter here".into(),
                    validation_status: ValidationStatus::Pending,
                    relatedness: 0.0,
                    validation_warnings: vec![],
                },
            )
            .unwrap();

        let findings = ledger.audit_corrections();
        assert!(findings
            .iter()
            .any(|f| f.kind == CorrectionFindingKind::StillPending && f.sequence == 3));
        assert!(findings
            .iter()
            .any(|f| f.kind == CorrectionFindingKind::LowRelatedness && f.sequence == 3));
    }

    #[test]
    fn audit_flags_orphaned_targets() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path());
        ledger
            .log_correction(
                ContextId::new("research"),
                Actor::Human,
                2,
                CorrectionType::Factual,
                "the treaty of westphalia was signed in 1648",
            )
            .unwrap();

        // Simulate lossy recovery dropping the target.
        ledger.entries.retain(|e| e.sequence != 2);
        let findings = ledger.audit_corrections();
        assert!(findings
            .iter()
            .any(|f| f.kind == CorrectionFindingKind::OrphanedTarget && f.target_sequence == 2));
    }

    #[test]
    fn analytics_counts_rate_and_types() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path());
        ledger
            .log_correction(
                ContextId::new("research"),
                Actor::Human,
                2,
                CorrectionType::Factual,
                "the treaty of westphalia was signed in 1648",
            )
            .unwrap();
        ledger.create_anchor("after correction").unwrap();

        let analytics = ledger.correction_analytics();
        // session_start + exchange are observational; the correction and the
        // anchor bookkeeping entry are not.
        assert_eq!(analytics.observational_entries, 2);
        assert_eq!(analytics.total_corrections, 1);
        assert!((analytics.correction_rate - 0.5).abs() < 1e-9);
        assert_eq!(analytics.corrections_by_type.get("factual"), Some(&1));
        assert_eq!(analytics.status_distribution.get("validated"), Some(&1));
    }

    #[test]
    fn relatedness_is_token_overlap() {
        assert!(relatedness("treaty westphalia 1648", "the treaty of westphalia 1658") > 0.5);
        assert_eq!(relatedness("", "anything"), 0.0);
        assert_eq!(relatedness("soup recipe paprika", "treaty of westphalia"), 0.0);
    }
}
