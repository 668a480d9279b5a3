//! Foundation types for Chronicle.
//!
//! This crate provides the identity, category, and payload types used
//! throughout the Chronicle ledger. Every other Chronicle crate depends on
//! `chronicle-types`.
//!
//! # Key Types
//!
//! - [`Digest`] — 32-byte BLAKE3 digest with hex wire form
//! - [`EventType`] — closed set of event categories
//! - [`Actor`] — producer of an event (human, assistant, agent, system)
//! - [`ContextId`] — conversation/workspace identifier
//! - [`EventPayload`] — per-category typed payload with boundary validation
//! - [`AnchorId`] / [`SequenceRange`] — checkpoint identity and coverage

pub mod anchor;
pub mod digest;
pub mod error;
pub mod event;
pub mod payload;

pub use anchor::{AnchorId, SequenceRange};
pub use digest::Digest;
pub use error::{PayloadError, TypeError};
pub use event::{Actor, ContextId, EventType};
pub use payload::{CorrectionType, EventPayload, ValidationStatus};
