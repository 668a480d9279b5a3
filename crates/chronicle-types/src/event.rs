use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Closed set of event categories the ledger records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionEnd,
    Exchange,
    SidebarSpawned,
    Correction,
    CorrectionConfirmed,
    AnchorCreated,
    ContentIngested,
    ContentReembedded,
    CitationCreated,
    ContentMarkedStale,
    RelationshipCreated,
    IntegrityAlarm,
}

impl EventType {
    /// Wire name of the category (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::Exchange => "exchange",
            Self::SidebarSpawned => "sidebar_spawned",
            Self::Correction => "correction",
            Self::CorrectionConfirmed => "correction_confirmed",
            Self::AnchorCreated => "anchor_created",
            Self::ContentIngested => "content_ingested",
            Self::ContentReembedded => "content_reembedded",
            Self::CitationCreated => "citation_created",
            Self::ContentMarkedStale => "content_marked_stale",
            Self::RelationshipCreated => "relationship_created",
            Self::IntegrityAlarm => "integrity_alarm",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Producer of an event: a human, the assistant, a named agent, or the
/// system itself.
///
/// Wire form is a plain string (`"human"`, `"assistant"`, `"system"`,
/// `"agent:<name>"`) so log lines stay greppable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Actor {
    Human,
    Assistant,
    System,
    Agent(String),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
            Self::Agent(name) => write!(f, "agent:{name}"),
        }
    }
}

impl FromStr for Actor {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Self::Human),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => match other.strip_prefix("agent:") {
                Some(name) if !name.is_empty() => Ok(Self::Agent(name.to_string())),
                _ => Err(TypeError::UnknownActor(other.to_string())),
            },
        }
    }
}

impl From<Actor> for String {
    fn from(actor: Actor) -> Self {
        actor.to_string()
    }
}

impl TryFrom<String> for Actor {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Conversation or workspace an event belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
