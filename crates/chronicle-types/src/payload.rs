use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::anchor::{AnchorId, SequenceRange};
use crate::digest::Digest;
use crate::error::{PayloadError, TypeError};
use crate::event::EventType;

/// Classification of a correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionType {
    /// The original statement was factually wrong.
    Factual,
    /// The original statement has since become outdated.
    Outdated,
    /// The original statement attributed something to the wrong source.
    Misattribution,
    /// The original statement was incomplete.
    Incomplete,
    /// A clarification rather than a contradiction.
    Clarification,
}

impl CorrectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Outdated => "outdated",
            Self::Misattribution => "misattribution",
            Self::Incomplete => "incomplete",
            Self::Clarification => "clarification",
        }
    }
}

impl fmt::Display for CorrectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CorrectionType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "factual" => Ok(Self::Factual),
            "outdated" => Ok(Self::Outdated),
            "misattribution" => Ok(Self::Misattribution),
            "incomplete" => Ok(Self::Incomplete),
            "clarification" => Ok(Self::Clarification),
            other => Err(TypeError::UnknownCorrectionType(other.to_string())),
        }
    }
}

/// Validation lifecycle of a correction.
///
/// A correction entry is written with `pending` or `validated`; the upgrade
/// to `human_confirmed` is a later `correction_confirmed` entry, never an
/// in-place mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Validated,
    HumanConfirmed,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::HumanConfirmed => "human_confirmed",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event-type-specific structured data carried by a ledger entry.
///
/// One variant per event category, externally tagged with the category's
/// snake_case wire name, so the payload object on disk is keyed by the same
/// string stored in the entry's `event_type` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    SessionStart {
        session_label: String,
        #[serde(default)]
        participants: Vec<String>,
    },
    SessionEnd {
        session_label: String,
        summary: String,
    },
    Exchange {
        query: String,
        response: String,
        response_hash: String,
        confidence: f64,
        #[serde(default)]
        uncertainty_flags: Vec<String>,
    },
    SidebarSpawned {
        sidebar_context: String,
        topic: String,
    },
    Correction {
        target_sequence: u64,
        correction_type: CorrectionType,
        correction_notes: String,
        validation_status: ValidationStatus,
        relatedness: f64,
        #[serde(default)]
        validation_warnings: Vec<String>,
    },
    CorrectionConfirmed {
        correction_sequence: u64,
        confirmed_by: String,
    },
    AnchorCreated {
        anchor_id: AnchorId,
        sequence_range: SequenceRange,
        root_hash: Digest,
        trigger_reason: String,
    },
    ContentIngested {
        content_id: String,
        source: String,
        content_hash: String,
        chunk_count: u64,
    },
    ContentReembedded {
        content_id: String,
        embedding_model: String,
        chunk_count: u64,
    },
    CitationCreated {
        content_id: String,
        citing_context: String,
        #[serde(default)]
        excerpt: String,
    },
    ContentMarkedStale {
        content_id: String,
        reason: String,
    },
    RelationshipCreated {
        from_content_id: String,
        to_content_id: String,
        relation: String,
    },
    IntegrityAlarm {
        detail: String,
        #[serde(default)]
        affected_sequence: Option<u64>,
    },
}

impl EventPayload {
    /// The event category this payload belongs to.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::SessionStart { .. } => EventType::SessionStart,
            Self::SessionEnd { .. } => EventType::SessionEnd,
            Self::Exchange { .. } => EventType::Exchange,
            Self::SidebarSpawned { .. } => EventType::SidebarSpawned,
            Self::Correction { .. } => EventType::Correction,
            Self::CorrectionConfirmed { .. } => EventType::CorrectionConfirmed,
            Self::AnchorCreated { .. } => EventType::AnchorCreated,
            Self::ContentIngested { .. } => EventType::ContentIngested,
            Self::ContentReembedded { .. } => EventType::ContentReembedded,
            Self::CitationCreated { .. } => EventType::CitationCreated,
            Self::ContentMarkedStale { .. } => EventType::ContentMarkedStale,
            Self::RelationshipCreated { .. } => EventType::RelationshipCreated,
            Self::IntegrityAlarm { .. } => EventType::IntegrityAlarm,
        }
    }

    /// Check per-category required fields, naming the first missing one.
    ///
    /// An empty string counts as missing. This is the boundary validator for
    /// upstream producers; a payload that fails here is never appended.
    pub fn validate(&self) -> Result<(), PayloadError> {
        let category = self.event_type().as_str();
        let require = |field: &'static str, value: &str| {
            if value.is_empty() {
                Err(PayloadError::MissingField { category, field })
            } else {
                Ok(())
            }
        };

        match self {
            Self::SessionStart { session_label, .. } => require("session_label", session_label),
            Self::SessionEnd {
                session_label,
                summary,
            } => {
                require("session_label", session_label)?;
                require("summary", summary)
            }
            Self::Exchange {
                query,
                response,
                response_hash,
                confidence,
                ..
            } => {
                require("query", query)?;
                require("response", response)?;
                require("response_hash", response_hash)?;
                if !(0.0..=1.0).contains(confidence) {
                    return Err(PayloadError::ConfidenceOutOfRange { value: *confidence });
                }
                Ok(())
            }
            Self::SidebarSpawned {
                sidebar_context,
                topic,
            } => {
                require("sidebar_context", sidebar_context)?;
                require("topic", topic)
            }
            Self::Correction {
                target_sequence,
                correction_notes,
                ..
            } => {
                if *target_sequence == 0 {
                    return Err(PayloadError::ZeroTargetSequence);
                }
                require("correction_notes", correction_notes)
            }
            Self::CorrectionConfirmed {
                correction_sequence,
                confirmed_by,
            } => {
                if *correction_sequence == 0 {
                    return Err(PayloadError::ZeroTargetSequence);
                }
                require("confirmed_by", confirmed_by)
            }
            Self::AnchorCreated { trigger_reason, .. } => {
                require("trigger_reason", trigger_reason)
            }
            Self::ContentIngested {
                content_id,
                source,
                content_hash,
                ..
            } => {
                require("content_id", content_id)?;
                require("source", source)?;
                require("content_hash", content_hash)
            }
            Self::ContentReembedded {
                content_id,
                embedding_model,
                ..
            } => {
                require("content_id", content_id)?;
                require("embedding_model", embedding_model)
            }
            Self::CitationCreated {
                content_id,
                citing_context,
                ..
            } => {
                require("content_id", content_id)?;
                require("citing_context", citing_context)
            }
            Self::ContentMarkedStale { content_id, reason } => {
                require("content_id", content_id)?;
                require("reason", reason)
            }
            Self::RelationshipCreated {
                from_content_id,
                to_content_id,
                relation,
            } => {
                require("from_content_id", from_content_id)?;
                require("to_content_id", to_content_id)?;
                require("relation", relation)
            }
            Self::IntegrityAlarm { detail, .. } => require("detail", detail),
        }
    }

    /// Human-language text carried by the payload, used for the correction
    /// relatedness check.
    pub fn text_content(&self) -> String {
        match self {
            Self::SessionStart { session_label, .. } => session_label.clone(),
            Self::SessionEnd {
                session_label,
                summary,
            } => format!("{session_label} {summary}"),
            Self::Exchange {
                query, response, ..
            } => format!("{query} {response}"),
            Self::SidebarSpawned {
                sidebar_context,
                topic,
            } => format!("{sidebar_context} {topic}"),
            Self::Correction {
                correction_notes, ..
            } => correction_notes.clone(),
            Self::CorrectionConfirmed { confirmed_by, .. } => confirmed_by.clone(),
            Self::AnchorCreated { trigger_reason, .. } => trigger_reason.clone(),
            Self::ContentIngested {
                content_id, source, ..
            } => format!("{content_id} {source}"),
            Self::ContentReembedded {
                content_id,
                embedding_model,
                ..
            } => format!("{content_id} {embedding_model}"),
            Self::CitationCreated {
                content_id,
                citing_context,
                excerpt,
            } => format!("{content_id} {citing_context} {excerpt}"),
            Self::ContentMarkedStale { content_id, reason } => {
                format!("{content_id} {reason}")
            }
            Self::RelationshipCreated {
                from_content_id,
                to_content_id,
                relation,
            } => format!("{from_content_id} {relation} {to_content_id}"),
            Self::IntegrityAlarm { detail, .. } => detail.clone(),
        }
    }

    /// Confidence signal, present only on exchanges.
    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::Exchange { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }

    /// Uncertainty flags, present only on exchanges.
    pub fn uncertainty_flags(&self) -> Option<&[String]> {
        match self {
            Self::Exchange {
                uncertainty_flags, ..
            } => Some(uncertainty_flags),
            _ => None,
        }
    }

    /// Correction target, present only on corrections.
    pub fn correction_target(&self) -> Option<u64> {
        match self {
            Self::Correction {
                target_sequence, ..
            } => Some(*target_sequence),
            _ => None,
        }
    }
}
