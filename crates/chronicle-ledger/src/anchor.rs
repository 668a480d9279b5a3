use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use chronicle_crypto::{ContentHasher, Signature, SigningKey, VerifyingKey};
use chronicle_types::{Actor, AnchorId, ContextId, Digest, EventPayload, SequenceRange};

use crate::error::LedgerError;
use crate::ledger::{now_timestamp, Ledger};

/// Signed checkpoint capturing the ledger's hash at a point in time.
///
/// An anchor proves that everything up to `sequence_range.last` existed with
/// `root_hash` when the anchor was taken. Anchors never mutate entries and
/// losing the anchor index never loses entry data; they exist so a copy held
/// outside the system can later confirm the log was not altered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub anchor_id: AnchorId,
    pub sequence_range: SequenceRange,
    /// `entry_hash` of the last covered entry.
    pub root_hash: Digest,
    pub signature: Signature,
    pub created_at: String,
    pub trigger_reason: String,
    /// Free-form extension fields for external custody systems.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct AnchorSigningView<'a> {
    anchor_id: &'a AnchorId,
    sequence_range: SequenceRange,
    root_hash: Digest,
    created_at: &'a str,
    trigger_reason: &'a str,
    extensions: &'a BTreeMap<String, serde_json::Value>,
}

impl Anchor {
    fn signing_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(&AnchorSigningView {
            anchor_id: &self.anchor_id,
            sequence_range: self.sequence_range,
            root_hash: self.root_hash,
            created_at: &self.created_at,
            trigger_reason: &self.trigger_reason,
            extensions: &self.extensions,
        })?)
    }

    fn seal(
        sequence_range: SequenceRange,
        root_hash: Digest,
        trigger_reason: String,
        key: &SigningKey,
    ) -> Result<Self, LedgerError> {
        let anchor_id = AnchorId::new();
        let created_at = now_timestamp();
        let extensions = BTreeMap::new();
        let signing_bytes = serde_json::to_vec(&AnchorSigningView {
            anchor_id: &anchor_id,
            sequence_range,
            root_hash,
            created_at: &created_at,
            trigger_reason: &trigger_reason,
            extensions: &extensions,
        })?;
        let signature = key.sign(&signing_bytes);

        Ok(Self {
            anchor_id,
            sequence_range,
            root_hash,
            signature,
            created_at,
            trigger_reason,
            extensions,
        })
    }

    /// Check the anchor's own signature, for external custody verification.
    pub fn verify_signature(&self, key: &VerifyingKey) -> bool {
        match self.signing_bytes() {
            Ok(bytes) => key.verify(&bytes, &self.signature).is_ok(),
            Err(_) => false,
        }
    }

    /// Domain-separated digest of the anchor itself, usable as a compact
    /// external fingerprint.
    pub fn fingerprint(&self) -> Result<Digest, LedgerError> {
        let bytes = self.signing_bytes()?;
        Ok(ContentHasher::ANCHOR.hash(&bytes))
    }
}

impl Ledger {
    /// Create a checkpoint over everything appended so far.
    ///
    /// Snapshots the head entry's sequence and hash, signs the anchor,
    /// appends an `anchor_created` entry (durably, like any other entry),
    /// then rewrites the side index wholesale. Refuses on an empty ledger.
    /// Anchors are safe at any point mid-sequence; creation policy is the
    /// caller's concern.
    pub fn create_anchor(&mut self, trigger_reason: &str) -> Result<Anchor, LedgerError> {
        let head = self.entries.last().ok_or(LedgerError::EmptyLedger)?;
        let sequence_range = SequenceRange::new(
            self.entries.first().map(|e| e.sequence).unwrap_or(1),
            head.sequence,
        );
        let root_hash = head.entry_hash;

        let anchor = Anchor::seal(
            sequence_range,
            root_hash,
            trigger_reason.to_string(),
            self.signing_key(),
        )?;

        self.append(
            ContextId::new("system"),
            Actor::System,
            EventPayload::AnchorCreated {
                anchor_id: anchor.anchor_id.clone(),
                sequence_range,
                root_hash,
                trigger_reason: trigger_reason.to_string(),
            },
        )?;

        self.anchors.push(anchor.clone());
        self.anchor_store().save(&self.anchors)?;
        debug!(
            anchor = %anchor.anchor_id.short_id(),
            range = %sequence_range,
            "anchor created"
        );
        Ok(anchor)
    }

    /// All known anchors, oldest first.
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Look up an anchor by its ID.
    pub fn anchor_by_id(&self, id: &AnchorId) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.anchor_id == *id)
    }

    /// Portable pretty-JSON representation of an anchor for custody outside
    /// the system.
    pub fn export_anchor(&self, id: &AnchorId) -> Result<String, LedgerError> {
        let anchor = self.anchor_by_id(id).ok_or_else(|| LedgerError::UnknownAnchor {
            id: id.to_string(),
        })?;
        Ok(serde_json::to_string_pretty(anchor)?)
    }
}

#[cfg(test)]
mod tests {
    use chronicle_types::EventType;

    use crate::storage::AnchorStore;

    use super::*;

    fn seeded(dir: &std::path::Path, count: u64) -> Ledger {
        let mut ledger = Ledger::open(dir).unwrap();
        for i in 0..count {
            ledger
                .append(
                    ContextId::new("ctx"),
                    Actor::Assistant,
                    EventPayload::Exchange {
                        query: format!("q{i}"),
                        response: format!("r{i}"),
                        response_hash: "cafe".into(),
                        confidence: 0.9,
                        uncertainty_flags: vec![],
                    },
                )
                .unwrap();
        }
        ledger
    }

    #[test]
    fn create_anchor_snapshots_head() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 5);
        let head_hash = ledger.head().unwrap().entry_hash;

        let anchor = ledger.create_anchor("entry count threshold").unwrap();
        assert_eq!(anchor.sequence_range, SequenceRange::new(1, 5));
        assert_eq!(anchor.root_hash, head_hash);

        // The anchor is also logged as an entry.
        let logged = ledger.head().unwrap();
        assert_eq!(logged.event_type, EventType::AnchorCreated);
        assert_eq!(logged.sequence, 6);
    }

    #[test]
    fn anchor_on_empty_ledger_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path()).unwrap();
        assert_eq!(
            ledger.create_anchor("nothing to cover").unwrap_err(),
            LedgerError::EmptyLedger
        );
    }

    #[test]
    fn anchor_signature_verifies_under_ledger_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 2);
        let anchor = ledger.create_anchor("explicit request").unwrap();
        assert!(anchor.verify_signature(&ledger.verifying_key()));

        let stranger = chronicle_crypto::SigningKey::generate();
        assert!(!anchor.verify_signature(&stranger.verifying_key()));
    }

    #[test]
    fn anchors_survive_reload_via_side_index() {
        let dir = tempfile::tempdir().unwrap();
        let anchor = {
            let mut ledger = seeded(dir.path(), 3);
            ledger.create_anchor("before restart").unwrap()
        };

        let reloaded = Ledger::open(dir.path()).unwrap();
        assert_eq!(reloaded.anchors().len(), 1);
        assert_eq!(reloaded.anchors()[0], anchor);
        assert!(reloaded.anchor_by_id(&anchor.anchor_id).is_some());
    }

    #[test]
    fn export_is_parseable_standalone() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 2);
        let anchor = ledger.create_anchor("custody export").unwrap();

        let exported = ledger.export_anchor(&anchor.anchor_id).unwrap();
        let parsed: Anchor = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed, anchor);
        assert!(parsed.verify_signature(&ledger.verifying_key()));
    }

    #[test]
    fn export_unknown_anchor_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(dir.path(), 1);
        let err = ledger.export_anchor(&AnchorId::new()).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAnchor { .. }));
    }

    #[test]
    fn anchor_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 2);
        let first = ledger.create_anchor("first").unwrap();
        let second = ledger.create_anchor("second").unwrap();

        let store = AnchorStore::open(&dir.path().join(crate::storage::ANCHOR_INDEX_FILE));
        let (anchors, warning) = store.load();
        assert!(warning.is_none());
        assert_eq!(anchors, vec![first, second]);
    }

    #[test]
    fn fingerprint_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 2);
        let anchor = ledger.create_anchor("fingerprint").unwrap();
        assert_eq!(
            anchor.fingerprint().unwrap(),
            anchor.fingerprint().unwrap()
        );
    }
}
