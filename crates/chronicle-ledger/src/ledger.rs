use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use chronicle_crypto::{keyfile, SigningKey, VerifyingKey};
use chronicle_types::{Actor, ContextId, EventPayload};

use crate::anchor::Anchor;
use crate::entry::LedgerEntry;
use crate::error::LedgerError;
use crate::storage::{
    AnchorStore, EntryLog, LoadWarning, RecoveryMode, ANCHOR_INDEX_FILE, ENTRY_LOG_FILE,
};

/// Caller-selectable policies for opening a ledger.
#[derive(Clone, Copy, Debug, Default)]
pub struct LedgerOptions {
    /// How reload reacts to unparseable entry records.
    pub recovery: RecoveryMode,
}

/// The append-only event ledger.
///
/// Single-writer by design: appends take `&mut self` and block until the
/// entry is durably on disk; reads take `&self`. No file locking or
/// multi-process coordination is provided. The signing key is owned by the
/// ledger and threaded through construction, never ambient state.
pub struct Ledger {
    dir: PathBuf,
    signing_key: SigningKey,
    log: EntryLog,
    anchor_store: AnchorStore,
    pub(crate) entries: Vec<LedgerEntry>,
    pub(crate) anchors: Vec<Anchor>,
    load_warnings: Vec<LoadWarning>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("dir", &self.dir)
            .field("signing_key", &"<redacted>")
            .field("log", &self.log)
            .field("anchor_store", &self.anchor_store)
            .field("entries", &self.entries)
            .field("anchors", &self.anchors)
            .field("load_warnings", &self.load_warnings)
            .finish()
    }
}

impl Ledger {
    /// Open (or create) a ledger directory with default options.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_with(dir, LedgerOptions::default())
    }

    /// Open (or create) a ledger directory.
    ///
    /// Creates the directory and key material on first run, then reloads the
    /// entry log and anchor index. Reload is corruption-tolerant per the
    /// chosen [`RecoveryMode`]; anchor-index loss is always non-fatal because
    /// entries are the record of truth and anchors are disposable.
    pub fn open_with(dir: impl AsRef<Path>, options: LedgerOptions) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let signing_key = keyfile::load_or_create(&dir.join(keyfile::KEY_FILE))
            .map_err(|e| LedgerError::Key(e.to_string()))?;

        let log = EntryLog::open(&dir.join(ENTRY_LOG_FILE))?;
        let (entries, mut load_warnings) = log.read_entries(options.recovery)?;

        let anchor_store = AnchorStore::open(&dir.join(ANCHOR_INDEX_FILE));
        let (anchors, anchor_warning) = anchor_store.load();
        load_warnings.extend(anchor_warning);

        debug!(
            dir = %dir.display(),
            entries = entries.len(),
            anchors = anchors.len(),
            warnings = load_warnings.len(),
            "ledger opened"
        );

        Ok(Self {
            dir,
            signing_key,
            log,
            anchor_store,
            entries,
            anchors,
            load_warnings,
        })
    }

    /// Append a new entry to the ledger.
    ///
    /// Validates the payload, computes the next sequence, links to the head
    /// entry's hash, signs, and durably writes the serialized line before any
    /// in-memory mutation. If the durable write fails, `WriteFailed` is
    /// returned and memory is exactly as before the call; memory and disk can
    /// never disagree about what has been committed.
    pub fn append(
        &mut self,
        context_id: ContextId,
        actor: Actor,
        payload: EventPayload,
    ) -> Result<LedgerEntry, LedgerError> {
        payload.validate()?;

        let head = self.entries.last();
        let sequence = head.map(|e| e.sequence + 1).unwrap_or(1);
        let previous_hash = head.map(|e| e.entry_hash);

        let entry = LedgerEntry::seal(
            sequence,
            now_timestamp(),
            previous_hash,
            context_id,
            actor,
            payload,
            &self.signing_key,
        )?;

        let line = serde_json::to_string(&entry)?;
        self.log
            .append_line(&line)
            .map_err(|e| LedgerError::WriteFailed {
                reason: e.to_string(),
            })?;

        self.entries.push(entry.clone());
        debug!(
            sequence,
            event_type = %entry.event_type,
            hash = %entry.entry_hash.short_hex(),
            "entry appended"
        );
        Ok(entry)
    }

    /// All loaded entries, in chain order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Number of loaded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the ledger holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry, if any.
    pub fn head(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    /// Look up an entry by its sequence number.
    pub fn entry(&self, sequence: u64) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.sequence == sequence)
    }

    /// The public key entries are currently verified against.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Warnings recorded during the last reload.
    pub fn load_warnings(&self) -> &[LoadWarning] {
        &self.load_warnings
    }

    /// The ledger directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub(crate) fn anchor_store(&self) -> &AnchorStore {
        &self.anchor_store
    }
}

/// Capture-time RFC 3339 UTC timestamp for a new record.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use std::fs::{self, OpenOptions};

    use chronicle_types::EventType;

    use super::*;

    fn exchange(confidence: f64) -> EventPayload {
        EventPayload::Exchange {
            query: "what changed".into(),
            response: "nothing yet".into(),
            response_hash: "feedc0de".into(),
            confidence,
            uncertainty_flags: vec![],
        }
    }

    fn seeded(dir: &Path, count: u64) -> Ledger {
        let mut ledger = Ledger::open(dir).unwrap();
        ledger
            .append(
                ContextId::new("ctx"),
                Actor::System,
                EventPayload::SessionStart {
                    session_label: "seed".into(),
                    participants: vec![],
                },
            )
            .unwrap();
        for _ in 1..count {
            ledger
                .append(ContextId::new("ctx"), Actor::Assistant, exchange(0.8))
                .unwrap();
        }
        ledger
    }

    #[test]
    fn sequences_start_at_one_and_increment() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(dir.path(), 4);
        let sequences: Vec<u64> = ledger.entries().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
    }

    #[test]
    fn chain_link_invariant_holds() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(dir.path(), 5);
        let entries = ledger.entries();
        assert!(entries[0].previous_hash.is_none());
        for i in 1..entries.len() {
            assert_eq!(entries[i].previous_hash, Some(entries[i - 1].entry_hash));
        }
    }

    #[test]
    fn append_rejects_invalid_payload_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 2);
        let err = ledger
            .append(ContextId::new("ctx"), Actor::Assistant, exchange(2.0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPayload(_)));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn reload_preserves_count_and_chain() {
        let dir = tempfile::tempdir().unwrap();
        let original: Vec<_> = {
            let ledger = seeded(dir.path(), 5);
            ledger.entries().to_vec()
        };

        let reloaded = Ledger::open(dir.path()).unwrap();
        assert_eq!(reloaded.entries(), &original[..]);
        assert!(reloaded.load_warnings().is_empty());
        assert!(reloaded.verify_chain().is_valid());
    }

    #[test]
    fn reload_after_truncated_tail_recovers_all_but_last() {
        let dir = tempfile::tempdir().unwrap();
        {
            seeded(dir.path(), 4);
        }

        let path = dir.path().join(ENTRY_LOG_FILE);
        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 25).unwrap();

        let ledger = Ledger::open(dir.path()).unwrap();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.load_warnings().len(), 1);
        assert!(ledger.verify_chain().is_valid());
    }

    #[test]
    fn append_after_lossy_tail_recovery_reuses_lost_sequence() {
        let dir = tempfile::tempdir().unwrap();
        {
            seeded(dir.path(), 3);
        }

        let path = dir.path().join(ENTRY_LOG_FILE);
        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 25).unwrap();

        let mut ledger = Ledger::open(dir.path()).unwrap();
        assert_eq!(ledger.len(), 2);
        let appended = ledger
            .append(ContextId::new("ctx"), Actor::Assistant, exchange(0.6))
            .unwrap();
        assert_eq!(appended.sequence, 3);
        assert!(ledger.verify_chain().is_valid());
    }

    #[test]
    fn write_failure_surfaces_and_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = seeded(dir.path(), 3);

        // Swap the log for a directory so the durable write fails regardless
        // of the uid the tests run under.
        let path = dir.path().join(ENTRY_LOG_FILE);
        let contents = fs::read(&path).unwrap();
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let before_head = ledger.head().unwrap().entry_hash;
        let err = ledger
            .append(ContextId::new("ctx"), Actor::Assistant, exchange(0.4))
            .unwrap_err();
        assert!(matches!(err, LedgerError::WriteFailed { .. }));
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.head().unwrap().entry_hash, before_head);

        fs::remove_dir(&path).unwrap();
        fs::write(&path, contents).unwrap();

        // Once storage is writable again the next append succeeds cleanly.
        let appended = ledger
            .append(ContextId::new("ctx"), Actor::Assistant, exchange(0.4))
            .unwrap();
        assert_eq!(appended.sequence, 4);
        assert!(ledger.verify_chain().is_valid());
    }

    #[test]
    fn strict_recovery_fails_on_corrupt_log() {
        let dir = tempfile::tempdir().unwrap();
        {
            seeded(dir.path(), 2);
        }
        let path = dir.path().join(ENTRY_LOG_FILE);
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("not json\n");
        fs::write(&path, contents).unwrap();

        assert!(Ledger::open(dir.path()).is_ok());
        let err = Ledger::open_with(
            dir.path(),
            LedgerOptions {
                recovery: RecoveryMode::Strict,
            },
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::CorruptRecord { line: 3, .. }));
    }

    #[test]
    fn corrupt_anchor_index_never_affects_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut ledger = seeded(dir.path(), 4);
            ledger.create_anchor("doomed index").unwrap();
        }
        fs::write(dir.path().join(crate::storage::ANCHOR_INDEX_FILE), "{ broken").unwrap();

        let ledger = Ledger::open(dir.path()).unwrap();
        assert_eq!(ledger.len(), 5);
        assert!(ledger.anchors().is_empty());
        assert_eq!(ledger.load_warnings().len(), 1);
        assert!(ledger.verify_chain().is_valid());
    }

    #[test]
    fn entry_lookup_by_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(dir.path(), 3);
        assert_eq!(ledger.entry(2).unwrap().sequence, 2);
        assert_eq!(ledger.entry(2).unwrap().event_type, EventType::Exchange);
        assert!(ledger.entry(9).is_none());
    }
}
