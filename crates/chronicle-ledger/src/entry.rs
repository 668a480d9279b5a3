use serde::{Deserialize, Serialize};

use chronicle_crypto::{ContentHasher, Signature, SigningKey};
use chronicle_types::digest::empty_as_none;
use chronicle_types::{Actor, ContextId, Digest, EventPayload, EventType};

use crate::error::LedgerError;

/// One immutable, sequenced, hash-linked record in the ledger.
///
/// Once written an entry never changes; the only evolution is later entries
/// referencing it. Two canonical serde views govern the crypto fields:
/// the signing view covers every field except `signature` and `entry_hash`,
/// and the hashing view adds `signature`. The resulting `entry_hash` is what
/// the next entry's `previous_hash` must equal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position in the chain: starts at 1, strictly increasing, no gaps.
    pub sequence: u64,
    /// Capture-time RFC 3339 string. Not a trusted clock, but protected
    /// from post-hoc editing because it is hashed and signed.
    pub timestamp: String,
    /// Hash of the prior entry; `None` (wire `""`) only for sequence 1.
    #[serde(with = "empty_as_none")]
    pub previous_hash: Option<Digest>,
    /// Category of the event; always agrees with the payload's tag on a
    /// well-formed entry.
    pub event_type: EventType,
    /// Conversation/workspace the event belongs to.
    pub context_id: ContextId,
    /// Producer of the event.
    pub actor: Actor,
    /// Event-type-specific structured data.
    pub payload: EventPayload,
    /// Ed25519 authorship proof over the signing view.
    pub signature: Signature,
    /// BLAKE3 digest over the hashing view.
    pub entry_hash: Digest,
}

#[derive(Serialize)]
struct SigningView<'a> {
    sequence: u64,
    timestamp: &'a str,
    #[serde(with = "empty_as_none")]
    previous_hash: Option<Digest>,
    event_type: EventType,
    context_id: &'a ContextId,
    actor: &'a Actor,
    payload: &'a EventPayload,
}

#[derive(Serialize)]
struct HashingView<'a> {
    sequence: u64,
    timestamp: &'a str,
    #[serde(with = "empty_as_none")]
    previous_hash: Option<Digest>,
    event_type: EventType,
    context_id: &'a ContextId,
    actor: &'a Actor,
    payload: &'a EventPayload,
    signature: &'a Signature,
}

impl LedgerEntry {
    /// Build, sign, and hash a new entry.
    ///
    /// The caller supplies chain position (`sequence`, `previous_hash`) and
    /// the signing key; the event type is derived from the payload so the
    /// two can never disagree on a freshly built entry.
    pub(crate) fn seal(
        sequence: u64,
        timestamp: String,
        previous_hash: Option<Digest>,
        context_id: ContextId,
        actor: Actor,
        payload: EventPayload,
        key: &SigningKey,
    ) -> Result<Self, LedgerError> {
        let event_type = payload.event_type();
        let signing_bytes = serde_json::to_vec(&SigningView {
            sequence,
            timestamp: &timestamp,
            previous_hash,
            event_type,
            context_id: &context_id,
            actor: &actor,
            payload: &payload,
        })?;
        let signature = key.sign(&signing_bytes);
        let entry_hash = ContentHasher::ENTRY.hash_json(&HashingView {
            sequence,
            timestamp: &timestamp,
            previous_hash,
            event_type,
            context_id: &context_id,
            actor: &actor,
            payload: &payload,
            signature: &signature,
        })?;

        Ok(Self {
            sequence,
            timestamp,
            previous_hash,
            event_type,
            context_id,
            actor,
            payload,
            signature,
            entry_hash,
        })
    }

    /// Canonical bytes the signature covers, rebuilt from current fields.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(&SigningView {
            sequence: self.sequence,
            timestamp: &self.timestamp,
            previous_hash: self.previous_hash,
            event_type: self.event_type,
            context_id: &self.context_id,
            actor: &self.actor,
            payload: &self.payload,
        })?)
    }

    /// Recompute the entry hash from current fields.
    ///
    /// On an untampered entry this equals the stored `entry_hash`.
    pub fn compute_hash(&self) -> Result<Digest, LedgerError> {
        self.compute_hash_with_previous(self.previous_hash)
    }

    /// Recompute the entry hash with an overridden previous hash.
    ///
    /// Used by anchor verification, which re-derives the whole covered
    /// prefix so an edit anywhere below the anchored head propagates into
    /// the recomputed root.
    pub fn compute_hash_with_previous(
        &self,
        previous_hash: Option<Digest>,
    ) -> Result<Digest, LedgerError> {
        Ok(ContentHasher::ENTRY.hash_json(&HashingView {
            sequence: self.sequence,
            timestamp: &self.timestamp,
            previous_hash,
            event_type: self.event_type,
            context_id: &self.context_id,
            actor: &self.actor,
            payload: &self.payload,
            signature: &self.signature,
        })?)
    }
}
