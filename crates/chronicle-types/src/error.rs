use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown actor: {0}")]
    UnknownActor(String),

    #[error("unknown correction type: {0}")]
    UnknownCorrectionType(String),
}

/// Errors produced by payload validation.
///
/// Raised at the append boundary when an upstream producer supplies a payload
/// that is structurally incomplete for its event category.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PayloadError {
    #[error("payload for {category} is missing required field {field}")]
    MissingField {
        category: &'static str,
        field: &'static str,
    },

    #[error("confidence {value} is outside [0, 1]")]
    ConfidenceOutOfRange { value: f64 },

    #[error("target sequence must be at least 1")]
    ZeroTargetSequence,
}
