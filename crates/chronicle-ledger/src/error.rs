use chronicle_types::PayloadError;

/// Errors produced by ledger operations.
///
/// Chain violations are deliberately absent: validity is a query answered by
/// `verify_chain`, not an error condition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("durable write failed ({reason}); in-memory state unchanged")]
    WriteFailed { reason: String },

    #[error("corrupt record at line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },

    #[error("correction target {target} does not exist")]
    MissingCorrectionTarget { target: u64 },

    #[error("correction against {target} blocked by unresolved warnings: {}", warnings.join("; "))]
    CorrectionBlocked { target: u64, warnings: Vec<String> },

    #[error("entry {sequence} is not a correction")]
    NotACorrection { sequence: u64 },

    #[error("cannot anchor an empty ledger")]
    EmptyLedger,

    #[error("unknown anchor: {id}")]
    UnknownAnchor { id: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("key error: {0}")]
    Key(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<chronicle_crypto::HasherError> for LedgerError {
    fn from(e: chronicle_crypto::HasherError) -> Self {
        Self::Serialization(e.to_string())
    }
}
