//! Append-only, cryptographically verifiable event ledger.
//!
//! This crate is the heart of Chronicle. It provides:
//! - The immutable [`LedgerEntry`] record with hash-linked integrity
//! - [`Ledger`] — durable append (disk first, memory after), reload with
//!   corruption-tolerant recovery, and the read surface
//! - Chain verification ([`ChainReport`]) and anchor cross-checks
//! - Anchor checkpoints for external custody
//! - The correction subsystem: validation-gated logging, human sign-off,
//!   audit, and analytics

pub mod anchor;
pub mod corrections;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod storage;
pub mod verify;

pub use anchor::Anchor;
pub use corrections::{
    CorrectionAnalytics, CorrectionCheck, CorrectionFinding, CorrectionFindingKind,
};
pub use entry::LedgerEntry;
pub use error::LedgerError;
pub use ledger::{Ledger, LedgerOptions};
pub use storage::{LoadWarning, RecoveryMode, ANCHOR_INDEX_FILE, ENTRY_LOG_FILE};
pub use verify::{verify_entries, AnchorCheck, ChainReport, ChainViolation, ViolationKind};
